use crate::collector::Statistics;
use crate::config::MadaaConfig;
use crate::types::Bucket;
use std::collections::HashMap;

pub const OTHER: &str = "Other";

/// Maps extensions (lower-case, no dot) onto display categories.
///
/// Lookup order: config remaps, then custom categories, then the built-in
/// table. Anything unmatched lands in [`OTHER`].
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    overrides: HashMap<String, String>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MadaaConfig) -> Self {
        let mut overrides = HashMap::new();

        for category in &config.categories {
            for ext in &category.extensions {
                overrides.insert(ext.clone(), category.name.clone());
            }
        }

        // Remaps go last so they win over custom categories
        for remap in &config.remaps {
            for ext in &remap.extensions {
                overrides.insert(ext.clone(), remap.category.clone());
            }
        }

        Self { overrides }
    }

    pub fn category_of<'a>(&'a self, ext: &str) -> &'a str {
        if let Some(category) = self.overrides.get(ext) {
            return category;
        }
        Self::builtin_category(ext)
    }

    fn builtin_category(ext: &str) -> &'static str {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "heic" | "heif" => "Images",
            "mp4" | "avi" | "mkv" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" => "Videos",
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" | "opus" => "Audio",
            "pdf" | "doc" | "docx" | "txt" | "odt" | "rtf" | "tex" | "md" => "Documents",
            "xls" | "xlsx" | "csv" | "ods" => "Spreadsheets",
            "ppt" | "pptx" | "odp" => "Presentations",
            "zip" | "tar" | "gz" | "bz2" | "7z" | "rar" | "xz" | "zst" | "tgz" => "Archives",
            "rs" | "py" | "js" | "ts" | "java" | "c" | "cpp" | "h" | "hpp" | "go" | "rb" | "php" | "swift" | "kt" => "Code",
            "json" | "xml" | "yaml" | "yml" | "toml" | "ini" | "conf" | "cfg" => "Config",
            "exe" | "dll" | "so" | "dylib" | "bin" | "app" | "deb" | "rpm" => "Binaries",
            "iso" | "img" | "dmg" | "vdi" | "vmdk" => "Disk Images",
            "db" | "sqlite" | "sql" | "mdb" => "Databases",
            "log" => "Logs",
            "ttf" | "otf" | "woff" | "woff2" => "Fonts",
            _ => OTHER,
        }
    }

    /// Rolls per-extension counts and bytes up into categories, largest first.
    pub fn rollup(&self, stats: &Statistics) -> Vec<Bucket> {
        let mut totals: HashMap<&str, (u64, u64)> = HashMap::new();

        for (ext, &count) in &stats.type_freq {
            let bytes = stats.type_sizes.get(ext).copied().unwrap_or(0);
            let entry = totals.entry(self.category_of(ext)).or_insert((0, 0));
            entry.0 += bytes;
            entry.1 += count;
        }

        let mut buckets: Vec<Bucket> = totals
            .into_iter()
            .map(|(key, (bytes, file_count))| Bucket {
                key: key.to_string(),
                bytes,
                percent: percent_of(bytes, stats.total_size),
                file_count,
            })
            .collect();

        buckets.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.key.cmp(&b.key)));
        buckets
    }
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}
