//! Core data types shared by every component of the engine: the bridgeable
//! value representation crossing the host/script boundary, the entity and
//! entity-type-definition model, interactions, behaviour bundles, script
//! metadata, and the snapshot type used by rollback.

pub mod behavior_bundle;
pub mod definition;
pub mod entity;
pub mod error;
pub mod interaction;
pub mod scheduled;
pub mod script_meta;
pub mod snapshot;
pub mod value;

pub use behavior_bundle::{BehaviorBundle, ConfigParam};
pub use definition::{
    ChildSpawnSpec, ConditionalTransform, EntityTypeDefinition, PropertyValueSpec, RenderCommand,
    Transform, TransformTarget, UpdateCondition,
};
pub use entity::Entity;
pub use error::{DefinitionError, EngineError, ScriptError};
pub use interaction::{Interaction, SystemEntity, TargetKey, TriggerMode};
pub use scheduled::ScheduledCallback;
pub use script_meta::{ScriptMetadata, ScriptOrigin, ScriptProvides, ScriptRequires, ScriptType};
pub use snapshot::Snapshot;
pub use value::{BridgeKey, BridgeTable, BridgeValue, IntoBridge, OrderedMap};

/// Identity type for an entity. Opaque to scripts; never reused within a session.
pub type EntityId = String;
