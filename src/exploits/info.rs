use std::path::Path;

/// Per-exploit metadata, read from an optional `info/<NAME>.txt` with
/// `About:` / `Author:` / `License:` lines. Anything missing shows as `N/A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploitInfo {
    pub about: String,
    pub author: String,
    pub license: String,
}

impl Default for ExploitInfo {
    fn default() -> Self {
        ExploitInfo {
            about: "N/A".to_string(),
            author: "N/A".to_string(),
            license: "N/A".to_string(),
        }
    }
}

impl ExploitInfo {
    pub fn parse(content: &str) -> ExploitInfo {
        let mut info = ExploitInfo::default();
        for line in content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("About:") {
                info.about = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Author:") {
                info.author = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("License:") {
                info.license = rest.trim().to_string();
            }
        }
        info
    }

    pub async fn load(info_dir: &Path, name: &str) -> ExploitInfo {
        let path = info_dir.join(format!("{name}.txt"));
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Self::parse(&content),
            Err(_) => ExploitInfo::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExploitInfo;

    #[test]
    fn parse_full_record() {
        const RECORD: &str = "\
About: Userland entry via the webkit heap
Author: somebody
License: GPLv3
";
        let info = ExploitInfo::parse(RECORD);
        assert_eq!(info.about, "Userland entry via the webkit heap");
        assert_eq!(info.author, "somebody");
        assert_eq!(info.license, "GPLv3");
    }

    #[test]
    fn missing_fields_default() {
        let info = ExploitInfo::parse("Author: somebody\n");
        assert_eq!(info.about, "N/A");
        assert_eq!(info.author, "somebody");
        assert_eq!(info.license, "N/A");
    }

    #[tokio::test]
    async fn missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let info = ExploitInfo::load(dir.path(), "Y2JB").await;
        assert_eq!(info, ExploitInfo::default());
    }
}
