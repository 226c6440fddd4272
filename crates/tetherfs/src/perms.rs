use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A POSIX permission triad (owner/group/other x read/write/execute).
///
/// Parses from and renders to the 9-character symbolic form, e.g.
/// `rwxr-x---`. Only the low 9 mode bits are represented; setuid/setgid
/// and sticky bits are outside this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionSet {
    mode: u32,
}

impl PermissionSet {
    /// Build a permission set from the low 9 bits of a POSIX mode.
    pub fn from_mode(mode: u32) -> Self {
        PermissionSet { mode: mode & 0o777 }
    }

    /// The permission bits as a POSIX mode value.
    pub fn mode(&self) -> u32 {
        self.mode
    }
}

impl FromStr for PermissionSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 9 {
            return Err(Error::invalid_argument(format!(
                "permission string must be 9 characters, got \"{}\"",
                s
            )));
        }
        let mut mode = 0u32;
        for (i, &b) in bytes.iter().enumerate() {
            let expected = [b'r', b'w', b'x'][i % 3];
            if b == expected {
                // Position 0 is the owner read bit (0o400), down to
                // position 8, the other execute bit (0o001).
                mode |= 0o400 >> i;
            } else if b != b'-' {
                return Err(Error::invalid_argument(format!(
                    "invalid permission character at position {} in \"{}\"",
                    i, s
                )));
            }
        }
        Ok(PermissionSet { mode })
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..9 {
            let symbol = [b'r', b'w', b'x'][i % 3];
            let set = self.mode & (0o400 >> i) != 0;
            write!(f, "{}", if set { symbol as char } else { '-' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_round_trip() {
        for s in [
            "rwxrwxrwx",
            "rwxr-x---",
            "rw-r--r--",
            "---------",
            "--x--x--x",
            "r--r--r--",
        ] {
            let perms: PermissionSet = s.parse().unwrap();
            assert_eq!(perms.to_string(), s);
        }
    }

    #[test]
    fn test_mode_bits() {
        let perms: PermissionSet = "rwxr-x---".parse().unwrap();
        assert_eq!(perms.mode(), 0o750);
        assert_eq!(PermissionSet::from_mode(0o640).to_string(), "rw-r-----");
    }

    #[test]
    fn test_from_mode_masks_high_bits() {
        assert_eq!(PermissionSet::from_mode(0o4755).mode(), 0o755);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("rwx".parse::<PermissionSet>().is_err());
        assert!("rwxr-x----".parse::<PermissionSet>().is_err());
        assert!("rwxr-q---".parse::<PermissionSet>().is_err());
        // Right characters in the wrong columns
        assert!("xwrr-x---".parse::<PermissionSet>().is_err());
    }
}
