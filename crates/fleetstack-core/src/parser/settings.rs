//! settings ノードのパース

use super::{bool_arg, first_string};
use crate::error::{Result, StackError};
use crate::model::Settings;
use kdl::KdlNode;
use tracing::warn;

/// settings ブロックを既存の設定に重ねる
///
/// 記載のない項目は変更しない。
pub fn apply_settings(settings: &mut Settings, node: &KdlNode) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let string = || -> Result<String> {
            first_string(child).map(str::to_string).ok_or_else(|| {
                StackError::InvalidConfig(format!(
                    "settings の '{}' には文字列が必要です",
                    child.name().value()
                ))
            })
        };

        match child.name().value() {
            "image-repo" | "image_repo" => settings.image_repo = Some(string()?),
            "build-images" | "build_images" => settings.build_images = bool_arg(child)?,
            "push-images" | "push_images" => settings.push_images = bool_arg(child)?,
            "force-pull-images" | "force_pull_images" => {
                settings.force_pull_images = bool_arg(child)?
            }
            "skip-image-cache" | "skip_image_cache" => {
                settings.skip_image_cache = bool_arg(child)?
            }
            "use-cache" | "use_cache" => settings.use_cache = bool_arg(child)?,
            "aws-region" | "aws_region" => settings.aws_region = Some(string()?),
            "aws-az1" | "aws_az1" => settings.aws_az1 = Some(string()?),
            "repo" => settings.repo = Some(string()?),
            "branch" => settings.branch = Some(string()?),
            "strict-ordering" | "strict_ordering" => settings.strict_ordering = bool_arg(child)?,
            other => {
                warn!(setting = other, "Unknown setting ignored");
            }
        }
    }
    Ok(())
}
