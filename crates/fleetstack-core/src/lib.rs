//! FleetStack core
//!
//! 宣言的なリソースグラフを環境ごとの適用計画に変換する。
//!
//! ```text
//! stack.kdl ─→ loader (discovery / template / parser) ─→ Workspace
//!                                                           │
//!                                  compose::EnvironmentComposition
//!                                   gate → resolve → assemble
//!                                                           │
//!                                                    EnvironmentPlan
//! ```
//!
//! 計画の組み立ては純粋な計算で、プロビジョニングは行わない。

pub mod compose;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

pub use compose::{EnvironmentComposition, compose_environment};
pub use discovery::{DiscoveredFiles, discover_files, discover_files_with_env, find_project_root};
pub use error::{Result, StackError};
pub use loader::{load_workspace, load_workspace_from_root, load_workspace_from_root_with_env};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
