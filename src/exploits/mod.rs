mod info;
pub use info::ExploitInfo;

mod y2jb;

use crate::Paths;

/// Options shared by every exploit entry point.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub paths: Paths,
    /// Re-prompt for the device address even when a saved config exists.
    pub config_override: bool,
}

/// Registry of shipped exploits. Lookup is by uppercased name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exploit {
    Y2jb,
}

impl Exploit {
    pub const ALL: [Exploit; 1] = [Exploit::Y2jb];

    pub fn name(&self) -> &'static str {
        match self {
            Exploit::Y2jb => "Y2JB",
        }
    }

    pub fn find(name: &str) -> Option<Exploit> {
        let name = name.to_uppercase();
        Self::ALL.into_iter().find(|exploit| exploit.name() == name)
    }

    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|exploit| exploit.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub async fn info(&self, paths: &Paths) -> ExploitInfo {
        ExploitInfo::load(&paths.info_dir, self.name()).await
    }

    pub async fn run(&self, opts: &RunOptions) -> anyhow::Result<()> {
        match self {
            Exploit::Y2jb => y2jb::run(opts).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Exploit;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Exploit::find("y2jb"), Some(Exploit::Y2jb));
        assert_eq!(Exploit::find("Y2JB"), Some(Exploit::Y2jb));
    }

    #[test]
    fn unknown_name() {
        assert_eq!(Exploit::find("NOPE"), None);
    }

    #[test]
    fn every_entry_resolves_by_its_own_name() {
        for exploit in Exploit::ALL {
            assert_eq!(Exploit::find(exploit.name()), Some(exploit));
        }
    }
}
