//! Type aliases for domain concepts.

/// Composite target key: `recipe/iaas/<key values joined by '/'>`.
pub type TargetKey = String;

/// A recipe name as packaged in the cookbook.
pub type RecipeName = String;

/// An infrastructure provider name (`aws`, `google`, ...).
///
/// Also the name a cloud provider is registered under.
pub type IaasName = String;

/// A backend type name (`s3`, `gcs`, ...).
pub type BackendType = String;
