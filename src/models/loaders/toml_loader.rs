use crate::error::ConfigError;
use crate::models::tutorial::TutorialStep;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 一个站点的自定义步骤集
///
/// ```toml
/// site_id = "github"
///
/// [[steps]]
/// id = "new-repo"
/// target_selector = "#new-repo-button"
/// title = "Create a repository"
/// description = "Start a new project here"
/// anchor_position = "bottom"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSet {
    pub site_id: String,
    #[serde(default)]
    pub steps: Vec<TutorialStep>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

/// 从 TOML 文件加载步骤集
pub async fn load_step_set(toml_file_path: &Path) -> Result<StepSet> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut set: StepSet =
        toml::from_str(&content).map_err(|source| ConfigError::StepFileParseFailed {
            path: toml_file_path.display().to_string(),
            source,
        })?;

    set.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(set)
}

/// 加载目录下所有步骤集，解析失败的文件跳过
pub async fn load_all_step_sets(folder_path: &str) -> Result<Vec<StepSet>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        tracing::debug!("步骤目录不存在: {}", folder_path);
        return Ok(Vec::new());
    }

    let mut sets = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            match load_step_set(&path).await {
                Ok(set) => {
                    tracing::info!(
                        "成功加载步骤集 {} ({} 个步骤)",
                        set.site_id,
                        set.steps.len()
                    );
                    sets.push(set);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// 查找某个站点的自定义步骤；空步骤集视为不存在
pub async fn find_custom_steps(folder_path: &str, site_id: &str) -> Result<Option<Vec<TutorialStep>>> {
    let sets = load_all_step_sets(folder_path).await?;
    Ok(sets
        .into_iter()
        .find(|set| set.site_id == site_id && !set.steps.is_empty())
        .map(|set| set.steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tutorial::AnchorPosition;

    const GITHUB_STEPS: &str = r##"
site_id = "github"

[[steps]]
id = "new-repo"
target_selector = "#new-repo-button"
title = "Create a repository"
description = "Start a new project here"
anchor_position = "right"

[[steps]]
id = "search"
selector = "input.search"
title = "Search"
description = "Find code"
"##;

    #[tokio::test]
    async fn test_find_custom_steps_by_site() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("github.toml"), GITHUB_STEPS).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "site_id = ").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let folder = dir.path().to_string_lossy().to_string();
        let steps = find_custom_steps(&folder, "github").await.unwrap().unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].anchor_position, AnchorPosition::Right);
        assert_eq!(steps[1].target_selector, "input.search");
        assert_eq!(steps[1].anchor_position, AnchorPosition::Bottom);

        assert!(find_custom_steps(&folder, "gmail").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_folder_is_empty() {
        let sets = load_all_step_sets("/definitely/not/here").await.unwrap();
        assert!(sets.is_empty());
    }
}
