pub mod broadphase;
pub mod error;
pub mod layers;
pub mod motion;
pub mod narrowphase;
pub mod resolve;
pub mod types;
pub mod world;

pub use error::PhysicsError;
pub use types::{BodyHandle, Collider, Contact, ContactManifold, RigidBody, RigidBodySpec, Shape, SleepState};
pub use world::{World, WorldTunables};
