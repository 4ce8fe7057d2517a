//! `PathPosition`: a plain `/`-separated path, the file-position
//! representation shared by the HDF5 and JSON backends (spec §3 "File
//! position": "for HDF5: an HDF5 path string"). ADIOS2 additionally tags
//! each position as a group or a dataset (`backend::adios2::file_state`).

use crate::writable::FilePosition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPosition(pub String);

impl FilePosition for PathPosition {
    fn to_canonical_string(&self) -> String {
        let trimmed = self.0.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn extended(&self, segment: &str) -> Self {
        if self.0.is_empty() || self.0.ends_with('/') {
            PathPosition(format!("{}{segment}", self.0))
        } else {
            PathPosition(format!("{}/{segment}", self.0))
        }
    }

    fn root() -> Self {
        PathPosition(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_has_no_trailing_slash_except_root() {
        assert_eq!(PathPosition::root().to_canonical_string(), "/");
        assert_eq!(
            PathPosition("/meshes/E".to_string()).to_canonical_string(),
            "/meshes/E"
        );
    }

    #[test]
    fn extended_normalizes_slashes() {
        let root = PathPosition::root();
        let child = root.extended("meshes");
        assert_eq!(child.0, "/meshes");
        let grandchild = child.extended("E");
        assert_eq!(grandchild.0, "/meshes/E");
    }
}
