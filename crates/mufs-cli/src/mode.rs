//! Symbolic permission changes (`u+x`, `go-w`, `a+rw`).

use std::str::FromStr;

use anyhow::{Result, bail};
use mufs_kernel::{AccessClass, Right};

const ALL_CLASSES: [AccessClass; 3] = [AccessClass::Owner, AccessClass::Group, AccessClass::Other];

/// One parsed `chmod` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    pub classes: Vec<AccessClass>,
    pub rights: Vec<Right>,
    pub enabled: bool,
}

impl ModeChange {
    /// Every (class, right) pair this change touches.
    pub fn bits(&self) -> impl Iterator<Item = (AccessClass, Right)> + '_ {
        self.classes
            .iter()
            .flat_map(|class| self.rights.iter().map(move |right| (*class, *right)))
    }
}

impl FromStr for ModeChange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(op_idx) = s.find(['+', '-']) else {
            bail!("expected [ugoa]*[+-][rwx]+, got {s:?}");
        };
        let (who, rest) = s.split_at(op_idx);
        let enabled = rest.starts_with('+');
        let what = &rest[1..];

        let mut classes = Vec::new();
        for c in who.chars() {
            if c == 'a' {
                classes.extend(ALL_CLASSES);
                continue;
            }
            match AccessClass::from_str(&c.to_string()) {
                Ok(class) => classes.push(class),
                Err(_) => bail!("unknown class {c:?} in {s:?}"),
            }
        }
        if classes.is_empty() {
            classes.push(AccessClass::Owner);
        }
        classes.dedup();

        let mut rights = Vec::new();
        for c in what.chars() {
            match Right::from_str(&c.to_string()) {
                Ok(right) => rights.push(right),
                Err(_) => bail!("unknown right {c:?} in {s:?}"),
            }
        }
        if rights.is_empty() {
            bail!("no rights given in {s:?}");
        }

        Ok(Self {
            classes,
            rights,
            enabled,
        })
    }
}
