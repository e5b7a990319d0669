//! caseflow-core: shared foundations for the caseflow post-processing pipeline.
//!
//! Everything downstream of the CRUD service runs through the pieces in this
//! crate: tenant identity, the closed failure taxonomy matched at every
//! worker boundary, the TTL-cached parameter resolver, and the object-storage
//! capability used for artifact confirmation and document enrichment.

pub mod clock;
pub mod error;
pub mod params;
pub mod storage;
pub mod tenant;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::FailureKind;
pub use params::{
    keys, MemoryParameterSource, ParamError, ParamResult, ParameterResolver, ParameterSource,
};
pub use storage::{MemoryObjectStore, ObjectHead, ObjectStore, StorageError, StorageResult};
pub use tenant::TenantId;
