//! Build definitions: types, builder, step helpers and the config document codec.

pub mod builder;
pub mod config;
pub mod duration;
pub mod steps;
pub mod types;

pub use builder::BuildDefinitionBuilder;
pub use types::{
  ArtifactObjects, Artifacts, Build, BuildDefinition, BuildOptions, BuildResults, BuildStatus, BuiltImage,
  DefinitionError, GitSource, RepoSource, Revision, SourceReference, Step, StorageSource, SubstitutionOption,
};
