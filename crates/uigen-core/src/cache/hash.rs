use serde::Serialize;

use crate::config::BuildOptions;

/// Blake3 hash of file content, hex encoded
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Options that change how files are scanned or resolved
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKey<'a> {
    alias_prefix: &'a str,
    extensions: &'a [String],
    resolve_index_files: bool,
}

/// Hash of the options cached records depend on; records are dropped when
/// it changes. Reporting options such as `pretty` are not part of it.
pub fn hash_config(options: &BuildOptions) -> String {
    let key = CacheKey {
        alias_prefix: &options.alias_prefix,
        extensions: &options.extensions,
        resolve_index_files: options.resolve_index_files,
    };
    // JSON keeps the hash stable across runs
    let json = serde_json::to_vec(&key).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}
