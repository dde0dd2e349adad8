pub mod git;
pub mod kube;

pub use git::{Git2Service, GitError, GitService};
pub use kube::{KubeClient, KubeClientFactory};
