use crate::categorize::CategoryTable;
use crate::classify::{AccessBucket, PermissionClass, SizeBucket};
use crate::collector::Statistics;
use crate::config::ColorResolver;
use crate::types::{
    Activity, Bucket, DatedFile, DirEntry, DiskUsage, Extremum, FileEntry, LargeFile, Ranked,
    Report, SpecialCounts, Totals, TypeShare,
};
use chrono::{DateTime, Utc};
use colored::*;
use humansize::{format_size, BINARY};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::Path;

const BOX_TL: &str = "╭";
const BOX_TR: &str = "╮";
const BOX_BL: &str = "╰";
const BOX_BR: &str = "╯";
const BOX_H: &str = "─";
const BOX_V: &str = "│";
const BOX_LT: &str = "├";
const BOX_RT: &str = "┤";

const HEADER_WIDTH: usize = 62;
const MAX_PATH_LEN: usize = 45;

/// Inputs for a report beyond the aggregate itself.
pub struct ReportContext<'a> {
    pub scanned_path: &'a Path,
    pub categories: &'a CategoryTable,
    pub top_entries: usize,
    pub disk_usage: Option<DiskUsage>,
    pub skipped: u64,
}

/// Turns a finished aggregate into the presentation model.
pub fn build_report(stats: &Statistics, ctx: &ReportContext<'_>) -> Report {
    let top = ctx.top_entries;
    let word_total: u64 = stats.word_freq.values().sum();

    Report {
        scanned_path: ctx.scanned_path.display().to_string(),
        totals: Totals {
            total_bytes: stats.total_size,
            file_count: stats.total_files,
            dir_count: stats.total_dirs,
            skipped_paths: ctx.skipped,
        },
        disk_usage: ctx.disk_usage.clone(),
        top_words: ranked(&stats.word_freq, word_total, top),
        types_by_count: types_by_count(stats, top),
        types_by_size: types_by_size(stats, top),
        categories: ctx.categories.rollup(stats),
        permissions: PermissionClass::ALL
            .iter()
            .map(|class| share(class.label(), stats.permissions.get(class), stats.total_files))
            .collect(),
        size_buckets: SizeBucket::ALL
            .iter()
            .map(|bucket| share(bucket.label(), stats.size_buckets.get(bucket), stats.total_files))
            .collect(),
        access_buckets: AccessBucket::ALL
            .iter()
            .map(|bucket| share(bucket.label(), stats.access_buckets.get(bucket), stats.total_files))
            .collect(),
        modification_years: stats
            .modification_years
            .iter()
            .map(|(year, count)| share(&year.to_string(), Some(count), stats.total_files))
            .collect(),
        activity: Activity {
            recent_files: stats.recent_files,
            stale_files: stats.stale_files,
            empty_files: stats.empty_files,
            empty_dirs: stats.empty_dirs,
        },
        special: SpecialCounts {
            hidden: stats.hidden,
            system: stats.system,
            symlinks: stats.symlinks,
            write_protected: stats.write_protected,
        },
        oldest: stats.oldest.as_ref().map(dated),
        newest: stats.newest.as_ref().map(dated),
        deepest_dirs: deepest_dirs(stats, top),
        busiest_dirs: busiest_dirs(stats, top),
        largest_files: stats.largest.sorted().into_iter().map(file_entry).collect(),
        largest_by_type: stats
            .largest_by_type
            .iter()
            .map(|(ext, heap)| (ext.clone(), heap.sorted().into_iter().map(file_entry).collect()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

fn share(key: &str, count: Option<&u64>, whole: u64) -> Ranked {
    let count = count.copied().unwrap_or(0);
    Ranked {
        key: key.to_string(),
        count,
        percent: percent_of(count, whole),
    }
}

/// Highest counts first; equal counts ordered by key so output is stable.
fn ranked(map: &HashMap<String, u64>, whole: u64, limit: usize) -> Vec<Ranked> {
    let mut entries: Vec<(&String, &u64)> = map.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(limit)
        .map(|(key, count)| share(key, Some(count), whole))
        .collect()
}

fn type_share(stats: &Statistics, ext: &str, percent: f64) -> TypeShare {
    TypeShare {
        extension: ext.to_string(),
        file_count: stats.type_freq.get(ext).copied().unwrap_or(0),
        bytes: stats.type_sizes.get(ext).copied().unwrap_or(0),
        percent,
    }
}

fn types_by_count(stats: &Statistics, limit: usize) -> Vec<TypeShare> {
    ranked(&stats.type_freq, stats.total_files, limit)
        .into_iter()
        .map(|r| type_share(stats, &r.key, r.percent))
        .collect()
}

fn types_by_size(stats: &Statistics, limit: usize) -> Vec<TypeShare> {
    ranked(&stats.type_sizes, stats.total_size, limit)
        .into_iter()
        .map(|r| type_share(stats, &r.key, r.percent))
        .collect()
}

fn dir_entry(stats: &Statistics, path: &Path, depth: usize) -> DirEntry {
    DirEntry {
        path: path.display().to_string(),
        depth,
        file_count: stats.dir_file_counts.get(path).copied().unwrap_or(0),
    }
}

fn deepest_dirs(stats: &Statistics, limit: usize) -> Vec<DirEntry> {
    let mut dirs: Vec<_> = stats.dir_depths.iter().collect();
    dirs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    dirs.into_iter()
        .take(limit)
        .map(|(path, &depth)| dir_entry(stats, path, depth))
        .collect()
}

fn busiest_dirs(stats: &Statistics, limit: usize) -> Vec<DirEntry> {
    let mut dirs: Vec<_> = stats
        .dir_file_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .collect();
    dirs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    dirs.into_iter()
        .take(limit)
        .map(|(path, _)| dir_entry(stats, path, stats.dir_depths.get(path).copied().unwrap_or(0)))
        .collect()
}

fn file_entry(file: &LargeFile) -> FileEntry {
    FileEntry {
        path: file.path.display().to_string(),
        bytes: file.size,
        extension: file.extension.clone(),
    }
}

fn dated(extremum: &Extremum) -> DatedFile {
    DatedFile {
        path: extremum.path.display().to_string(),
        modified: DateTime::<Utc>::from(extremum.modified),
    }
}

/// Keeps the tail of a long path, which is usually the informative part.
fn shorten_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        return path.to_string();
    }
    let tail: String = path.chars().skip(len - max_len + 3).collect();
    format!("...{}", tail)
}

pub struct TerminalRenderer {
    use_color: bool,
    verbose: bool,
    colors: ColorResolver,
}

impl TerminalRenderer {
    pub fn new(use_color: bool, verbose: bool, colors: ColorResolver) -> Self {
        Self {
            use_color,
            verbose,
            colors,
        }
    }

    pub fn render(&self, report: &Report) {
        println!();
        self.print_header(report);
        println!();
        self.print_buckets(&report.categories);

        println!();
        self.print_type_shares("Types by Count", &report.types_by_count, |t| {
            format!("{} files", t.file_count)
        });
        println!();
        self.print_type_shares("Types by Size", &report.types_by_size, |t| {
            format_size(t.bytes, BINARY)
        });

        println!();
        self.print_ranked("Common Words in Filenames", &report.top_words, "occurrences");
        println!();
        self.print_ranked("Permissions", &report.permissions, "files");
        println!();
        self.print_ranked("Size Distribution", &report.size_buckets, "files");
        println!();
        self.print_ranked("Last Access", &report.access_buckets, "files");
        println!();
        self.print_ranked("Modification Years", &report.modification_years, "files");

        println!();
        self.print_activity(report);

        if !report.deepest_dirs.is_empty() {
            println!();
            self.print_dirs("Deepest Directories", &report.deepest_dirs, |d| {
                format!("depth {}", d.depth)
            });
        }
        if !report.busiest_dirs.is_empty() {
            println!();
            self.print_dirs("Most Files", &report.busiest_dirs, |d| {
                format!("{} files", d.file_count)
            });
        }

        if self.verbose {
            if !report.largest_files.is_empty() {
                println!();
                self.print_top_files("Top Largest Files", &report.largest_files);
            }

            for (ext, files) in &report.largest_by_type {
                println!();
                self.print_top_files(&format!("Largest .{} Files", ext), files);
            }
        }
        println!();
    }

    fn print_header(&self, report: &Report) {
        let width = HEADER_WIDTH;

        // Top border
        println!(
            "  {}{}{}",
            self.colorize(BOX_TL, "bright_black", false),
            self.colorize(&BOX_H.repeat(width), "bright_black", false),
            self.colorize(BOX_TR, "bright_black", false)
        );

        // Title line
        let title = format!("  Data Analysis: {}", report.scanned_path);
        let title_display = if title.chars().count() > width - 2 {
            let head: String = title.chars().take(width - 5).collect();
            format!("{}...", head)
        } else {
            title
        };
        let padding = width.saturating_sub(title_display.chars().count());
        println!(
            "  {} {}{} {}",
            self.colorize(BOX_V, "bright_black", false),
            self.colorize(&title_display, "cyan", true),
            " ".repeat(padding.saturating_sub(2)),
            self.colorize(BOX_V, "bright_black", false)
        );

        // Separator
        println!(
            "  {}{}{}",
            self.colorize(BOX_LT, "bright_black", false),
            self.colorize(&BOX_H.repeat(width), "bright_black", false),
            self.colorize(BOX_RT, "bright_black", false)
        );

        if let Some(disk) = &report.disk_usage {
            let scan_percent = percent_of(report.totals.total_bytes, disk.total_space);

            let disk_line = format!(
                "  Disk: {} / {} ({:.1}% used)",
                format_size(disk.used_space, BINARY),
                format_size(disk.total_space, BINARY),
                disk.used_percent
            );
            self.print_boxed_line(
                &disk_line,
                &format!(
                    "{} {} / {} ({:.1}% used)",
                    self.colorize(" Disk:", "white", false),
                    self.colorize(&format_size(disk.used_space, BINARY), "yellow", false),
                    self.colorize(&format_size(disk.total_space, BINARY), "blue", false),
                    disk.used_percent
                ),
            );

            let scanned_line = format!(
                "  Scanned: {} ({:.2}% of disk)",
                format_size(report.totals.total_bytes, BINARY),
                scan_percent
            );
            self.print_boxed_line(
                &scanned_line,
                &format!(
                    "{} {} ({:.2}% of disk)",
                    self.colorize(" Scanned:", "white", false),
                    self.colorize(&format_size(report.totals.total_bytes, BINARY), "green", true),
                    scan_percent
                ),
            );
        }

        // Stats line
        let stats_line = format!(
            "  Files: {}  │  Dirs: {}  │  Skipped: {}",
            report.totals.file_count, report.totals.dir_count, report.totals.skipped_paths
        );
        let skipped_color = if report.totals.skipped_paths > 0 {
            "yellow"
        } else {
            "cyan"
        };
        self.print_boxed_line(
            &stats_line,
            &format!(
                "{} {}  {}  {} {}  {}  {} {}",
                self.colorize(" Files:", "white", false),
                self.colorize(&report.totals.file_count.to_string(), "cyan", false),
                self.colorize("│", "bright_black", false),
                self.colorize("Dirs:", "white", false),
                self.colorize(&report.totals.dir_count.to_string(), "cyan", false),
                self.colorize("│", "bright_black", false),
                self.colorize("Skipped:", "white", false),
                self.colorize(&report.totals.skipped_paths.to_string(), skipped_color, false),
            ),
        );

        // Bottom border
        println!(
            "  {}{}{}",
            self.colorize(BOX_BL, "bright_black", false),
            self.colorize(&BOX_H.repeat(width), "bright_black", false),
            self.colorize(BOX_BR, "bright_black", false)
        );
    }

    /// `plain` is measured for padding, `styled` is what gets printed.
    fn print_boxed_line(&self, plain: &str, styled: &str) {
        let padding = HEADER_WIDTH.saturating_sub(plain.chars().count());
        println!(
            "  {} {}{} {}",
            self.colorize(BOX_V, "bright_black", false),
            styled,
            " ".repeat(padding.saturating_sub(1)),
            self.colorize(BOX_V, "bright_black", false)
        );
    }

    fn print_section_title(&self, title: &str) {
        println!(
            "  {} {}",
            self.colorize("▼", "cyan", false),
            self.colorize(title, "cyan", true)
        );
        println!(
            "  {}",
            self.colorize(&"─".repeat(60), "bright_black", false)
        );
    }

    fn print_buckets(&self, buckets: &[Bucket]) {
        if buckets.is_empty() {
            println!("  No files found.");
            return;
        }

        let max_label_len = buckets
            .iter()
            .map(|b| b.key.chars().count() + 2)
            .max()
            .unwrap_or(0)
            .max(10);
        let max_size_len = buckets
            .iter()
            .map(|b| format_size(b.bytes, BINARY).len())
            .max()
            .unwrap_or(0)
            .max(10);

        // Table header
        println!(
            "  {}  {:>size_width$}  {:>8}  {:>8}  {}",
            self.colorize(
                &format!("{:<width$}", "CATEGORY", width = max_label_len),
                "bright_black",
                true
            ),
            self.colorize("SIZE", "bright_black", true),
            self.colorize("PERCENT", "bright_black", true),
            self.colorize("FILES", "bright_black", true),
            self.colorize("DISTRIBUTION", "bright_black", true),
            size_width = max_size_len
        );

        // Separator line
        println!(
            "  {}",
            self.colorize(
                &format!(
                    "{}  {}  {}  {}  {}",
                    "─".repeat(max_label_len),
                    "─".repeat(max_size_len),
                    "─".repeat(8),
                    "─".repeat(8),
                    "─".repeat(24)
                ),
                "bright_black",
                false
            )
        );

        for bucket in buckets {
            self.print_bucket(bucket, max_label_len, max_size_len);
        }
    }

    fn print_bucket(&self, bucket: &Bucket, label_width: usize, size_width: usize) {
        let size_str = format_size(bucket.bytes, BINARY);
        let percent_str = format!("{:.1}%", bucket.percent);
        let icon = self.get_category_icon(&bucket.key);
        let bar = self.create_gradient_bar(bucket.percent, 24);

        if self.use_color {
            let label_formatted = format!(
                "{} {:<width$}",
                icon,
                bucket.key,
                width = label_width - 2
            );
            let label_color = self
                .colors
                .resolve_bucket_color(bucket)
                .unwrap_or_else(|| "white".to_string());

            println!(
                "  {}  {}  {}  {}  {}",
                self.colorize(&label_formatted, &label_color, bucket.percent > 50.0),
                self.colorize(&format!("{:>width$}", size_str, width = size_width), "green", false),
                self.colorize(&format!("{:>7}", percent_str), "cyan", false),
                self.colorize(&format!("{:>8}", bucket.file_count), "blue", false),
                bar
            );
        } else {
            println!(
                "  {} {:<label_width$}  {:>size_width$}  {:>7}  {:>8}  {}",
                icon,
                bucket.key,
                size_str,
                percent_str,
                bucket.file_count,
                bar,
                label_width = label_width - 2,
                size_width = size_width
            );
        }
    }

    fn get_category_icon(&self, label: &str) -> &'static str {
        match label.to_lowercase().as_str() {
            "other" => "◆",
            "binaries" => "⚙",
            "code" => "◇",
            "archives" => "▣",
            "config" => "⚡",
            "documents" => "▤",
            "fonts" => "◈",
            "images" => "▦",
            "spreadsheets" => "▥",
            "presentations" => "▨",
            "audio" => "♪",
            "videos" => "▶",
            "logs" => "▧",
            "databases" => "◉",
            "disk images" => "◎",
            _ => "•",
        }
    }

    fn create_gradient_bar(&self, percent: f64, max_width: usize) -> String {
        let filled = ((percent / 100.0) * max_width as f64) as usize;
        let filled = filled.min(max_width);

        if !self.use_color {
            let empty = max_width - filled;
            return format!("{}{}", "█".repeat(filled), "░".repeat(empty));
        }

        let mut bar = String::new();

        for i in 0..max_width {
            if i < filled {
                // Gradient from green to yellow to red based on position in the filled area
                let position_percent = (i as f64 / max_width as f64) * 100.0;
                let char_colored = if position_percent > 60.0 || percent > 50.0 {
                    "█".red().to_string()
                } else if position_percent > 30.0 || percent > 20.0 {
                    "█".yellow().to_string()
                } else {
                    "█".green().to_string()
                };
                bar.push_str(&char_colored);
            } else {
                bar.push_str(&"░".bright_black().to_string());
            }
        }

        bar
    }

    fn print_ranked(&self, title: &str, rows: &[Ranked], unit: &str) {
        self.print_section_title(title);
        if rows.is_empty() {
            println!("  {}", self.colorize("(none)", "bright_black", false));
            return;
        }

        let key_width = rows.iter().map(|r| r.key.chars().count()).max().unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            println!(
                "  {} {}  {} {}  {}",
                self.colorize(&format!("{:>2}.", i + 1), "bright_black", false),
                self.colorize(&format!("{:<width$}", row.key, width = key_width), "white", false),
                self.colorize(&format!("{:>8}", row.count), "green", false),
                unit,
                self.colorize(&format!("({:.1}%)", row.percent), "cyan", false)
            );
        }
    }

    fn print_type_shares<F>(&self, title: &str, rows: &[TypeShare], amount: F)
    where
        F: Fn(&TypeShare) -> String,
    {
        self.print_section_title(title);
        if rows.is_empty() {
            println!("  {}", self.colorize("(none)", "bright_black", false));
            return;
        }

        for (i, row) in rows.iter().enumerate() {
            println!(
                "  {} {:<16} {:>12}  {}",
                self.colorize(&format!("{:>2}.", i + 1), "bright_black", false),
                self.colorize(&row.extension, "white", false),
                self.colorize(&amount(row), "green", false),
                self.colorize(&format!("({:.1}%)", row.percent), "cyan", false)
            );
        }
    }

    fn print_activity(&self, report: &Report) {
        self.print_section_title("Activity");
        let total = report.totals.file_count;
        let line = |label: &str, count: u64| {
            println!(
                "  {:<28} {} of {} {}",
                label,
                self.colorize(&count.to_string(), "green", false),
                total,
                self.colorize(&format!("({:.1}%)", percent_of(count, total)), "cyan", false)
            );
        };

        line("Modified in last 30 days:", report.activity.recent_files);
        line("Untouched for 6+ months:", report.activity.stale_files);
        line("Empty files:", report.activity.empty_files);
        println!("  {:<28} {}", "Empty directories:", report.activity.empty_dirs);
        println!(
            "  {:<28} {} hidden, {} system, {} symlinks, {} write-protected",
            "Special:",
            report.special.hidden,
            report.special.system,
            report.special.symlinks,
            report.special.write_protected
        );

        if let Some(oldest) = &report.oldest {
            println!(
                "  {:<28} {} ({})",
                "Oldest file:",
                self.colorize(&shorten_path(&oldest.path, MAX_PATH_LEN), "white", false),
                oldest.modified.format("%Y-%m-%d")
            );
        }
        if let Some(newest) = &report.newest {
            println!(
                "  {:<28} {} ({})",
                "Newest file:",
                self.colorize(&shorten_path(&newest.path, MAX_PATH_LEN), "white", false),
                newest.modified.format("%Y-%m-%d")
            );
        }
    }

    fn print_dirs<F>(&self, title: &str, dirs: &[DirEntry], detail: F)
    where
        F: Fn(&DirEntry) -> String,
    {
        self.print_section_title(title);

        for (i, dir) in dirs.iter().enumerate() {
            println!(
                "  {} {:>10}  {}",
                self.colorize(&format!("{:>2}.", i + 1), "bright_black", false),
                self.colorize(&detail(dir), "green", false),
                self.colorize(&shorten_path(&dir.path, MAX_PATH_LEN), "white", false)
            );
        }
    }

    fn print_top_files(&self, title: &str, files: &[FileEntry]) {
        if files.is_empty() {
            return;
        }

        self.print_section_title(title);

        for (i, file) in files.iter().enumerate() {
            println!(
                "  {} {:>10}  {}",
                self.colorize(&format!("{:>2}.", i + 1), "bright_black", false),
                self.colorize(&format_size(file.bytes, BINARY), "green", false),
                self.colorize(&shorten_path(&file.path, MAX_PATH_LEN), "white", false)
            );
        }
    }

    fn colorize(&self, text: &str, color: &str, bold: bool) -> String {
        if !self.use_color {
            return text.to_string();
        }

        let colored = match color {
            "red" => text.red(),
            "green" => text.green(),
            "yellow" => text.yellow(),
            "blue" => text.blue(),
            "cyan" => text.cyan(),
            "magenta" => text.magenta(),
            "white" => text.white(),
            "bright_black" => text.bright_black(),
            _ => text.normal(),
        };

        if bold {
            colored.bold().to_string()
        } else {
            colored.to_string()
        }
    }
}

pub struct JsonRenderer;

impl JsonRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, report: &Report, output_file: Option<&Path>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(report)?;

        if let Some(path) = output_file {
            std::fs::write(path, json)?;
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}
