use thiserror::Error;

/// Structural or semantic manifest defects. Fatal for the whole command
/// that triggered the load (§7 `ManifestParseError`).
#[derive(Debug, Error)]
pub enum ManifestParseError {
    #[error("could not read manifest file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse manifest XML in {path}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::DeError,
    },

    #[error(
        "manifest defines conflicting <default/> elements across included fragments \
         (first in {first_path}, conflicting one in {second_path})"
    )]
    ConflictingDefaults { first_path: String, second_path: String },

    #[error("project {project:?} references unknown remote {remote:?}")]
    UnknownRemote { project: String, remote: String },

    #[error(
        "project {project:?} has no revision: none given explicitly, by its remote, or by \
         the manifest default"
    )]
    MissingRevision { project: String },

    #[error("include {name:?} in {from_path} could not be resolved: {reason}")]
    UnresolvedInclude { name: String, from_path: String, reason: String },

    #[error("extend-project references unknown project {name:?}")]
    UnknownExtendTarget { name: String },
}
