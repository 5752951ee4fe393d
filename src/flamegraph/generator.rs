//! SVG retention flamegraph generation.
//!
//! Renders collapsed dominator stacks as an icicle-style SVG:
//! - Root frame at the bottom, retained children stacked above it
//! - Width proportional to retained bytes
//! - Colors by frame kind (roots, groups, arrays, strings)

use crate::aggregator::stack_builder::CollapsedStack;
use crate::output::schema::Retainer;
use crate::utils::config::DEFAULT_FLAMEGRAPH_WIDTH;
use crate::utils::error::FlamegraphError;
use log::info;
use std::collections::HashMap;

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Heap Retention".to_string(),
            width: DEFAULT_FLAMEGRAPH_WIDTH,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Frame tree node, stored in an arena
struct Frame {
    name: String,
    value: u64,
    children: HashMap<String, usize>,
}

impl Frame {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: 0,
            children: HashMap::new(),
        }
    }
}

/// Merge all stacks into one frame tree; frame 0 is the synthetic root
fn build_frames(stacks: &[CollapsedStack]) -> Vec<Frame> {
    let mut frames = vec![Frame::new("all")];
    for stack in stacks {
        frames[0].value += stack.weight;
        let mut current = 0;
        for part in stack.stack.split(';') {
            let next = match frames[current].children.get(part) {
                Some(&child) => child,
                None => {
                    let child = frames.len();
                    frames.push(Frame::new(part));
                    frames[current].children.insert(part.to_string(), child);
                    child
                }
            };
            frames[next].value += stack.weight;
            current = next;
        }
    }
    frames
}

/// Generate SVG flamegraph from collapsed stacks
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating retention flamegraph with {} stacks", stacks.len());

    let frames = build_frames(stacks);
    let max_depth = stacks
        .iter()
        .map(|s| s.stack.split(';').count())
        .max()
        .unwrap_or(0);

    let mut svg_content = String::new();
    let width = config.width;
    let height_per_level = 20;
    let graph_height = (max_depth + 1) * height_per_level;
    let legend_height = 80;
    let total_height = graph_height + legend_height;

    // Header
    svg_content.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, total_height, width, total_height
    ));

    // Styles
    svg_content.push_str(
        r#"<style>.frame { font: 12px sans-serif; } .frame:hover { stroke: black; stroke-width: 1; cursor: pointer; opacity: 0.9; }</style>"#,
    );

    // Title
    svg_content.push_str(&format!(
        r#"<text x="{}" y="20" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        escape_xml(&config.title)
    ));

    render_frames(
        &frames,
        width as f64,
        &mut svg_content,
        height_per_level,
        graph_height,
    );

    render_legend(&mut svg_content, graph_height);

    svg_content.push_str("</svg>");

    info!("Flamegraph generated successfully ({} bytes)", svg_content.len());
    Ok(svg_content)
}

fn get_frame_color(name: &str) -> &'static str {
    if name == "all" || name == "process" {
        "rgb(100, 149, 237)" // Cornflower Blue
    } else if name.starts_with("static ") || name.starts_with("gc_handle") {
        "rgb(70, 130, 180)" // Steel Blue
    } else if name.starts_with("class ")
        || name.starts_with("namespace ")
        || name.starts_with("assembly ")
    {
        "rgb(34, 139, 34)" // Forest Green
    } else if name.ends_with("[]") {
        "rgb(220, 20, 60)" // Crimson
    } else if name.contains("String") {
        "rgb(255, 140, 0)" // Dark Orange
    } else {
        "rgb(169, 169, 169)" // Gray (Generic)
    }
}

fn get_ansi_color(kind: &str) -> &'static str {
    match kind {
        "root" => "\x1b[34m",                                // Blue
        "class" | "namespace" | "assembly" => "\x1b[32m",    // Green
        "process" => "\x1b[36m",                             // Cyan
        _ => "\x1b[33m",                                     // Yellow
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Lay out the frame tree with an explicit work list
fn render_frames(frames: &[Frame], width: f64, out: &mut String, h: usize, graph_height: usize) {
    // (frame, level, x, w)
    let mut pending: Vec<(usize, usize, f64, f64)> = vec![(0, 0, 0.0, width)];

    while let Some((index, level, x, w)) = pending.pop() {
        // Don't render invisible blocks
        if w < 0.5 {
            continue;
        }
        let frame = &frames[index];
        let color = get_frame_color(&frame.name);
        let name = escape_xml(&frame.name);

        // Y position (Inverted: Graph Bottom - (Level * Height)), 30px title margin
        let y = graph_height - ((level + 1) * h) + 30;

        out.push_str(&format!(
            r#"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" class="frame"><title>{} ({} bytes)</title></rect>"#,
            x, y, w, h, color, name, frame.value
        ));

        if w > 35.0 {
            let char_width = 7.0;
            let max_chars = (w / char_width) as usize;
            let display_name: String = if frame.name.chars().count() > max_chars && max_chars > 3 {
                let kept: String = frame.name.chars().take(max_chars - 3).collect();
                format!("{}...", kept)
            } else {
                frame.name.clone()
            };

            if !display_name.is_empty() {
                out.push_str(&format!(
                    r#"<text x="{:.2}" y="{}" dx="4" dy="14" font-size="12" fill="white" pointer-events="none">{}</text>"#,
                    x,
                    y,
                    escape_xml(&display_name)
                ));
            }
        }

        let mut children: Vec<usize> = frame.children.values().copied().collect();
        children.sort_by(|&a, &b| {
            frames[b]
                .value
                .cmp(&frames[a].value)
                .then_with(|| frames[a].name.cmp(&frames[b].name))
        });

        let mut current_x = x;
        for child in children {
            let child_w = if frame.value > 0 {
                (frames[child].value as f64 / frame.value as f64) * w
            } else {
                0.0
            };
            pending.push((child, level + 1, current_x, child_w));
            current_x += child_w;
        }
    }
}

fn render_legend(out: &mut String, graph_height: usize) {
    let legend_y = graph_height + 50;

    out.push_str(&format!(
        r#"<text x="10" y="{}" font-size="14" font-weight="bold">Legend:</text>"#,
        legend_y
    ));

    let items = [
        ("Root", "rgb(70, 130, 180)"),
        ("Group", "rgb(34, 139, 34)"),
        ("Array", "rgb(220, 20, 60)"),
        ("String", "rgb(255, 140, 0)"),
        ("Object", "rgb(169, 169, 169)"),
    ];

    for (i, (label, color)) in items.iter().enumerate() {
        let x = 80 + (i * 120);
        out.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}" rx="2"/>"#,
            x,
            legend_y - 12,
            color
        ));
        out.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
            x + 20,
            legend_y,
            label
        ));
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Create a rich text summary of the top retainers
pub fn generate_text_summary(retainers: &[Retainer], max_lines: usize, total_bytes: u64) -> String {
    let mut lines = Vec::new();

    lines.push("  TOP RETAINERS".to_string());
    lines.push("  ┏━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━┳━━━━━━━━━┓".to_string());
    lines.push(format!(
        "  ┃ {:<42} ┃ {:^12} ┃ {:^12} ┃ {:^7} ┃",
        "Node (Largest First)", "RETAINED", "OWN", "%"
    ));
    lines.push("  ┣━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━╋━━━━━━━━━┫".to_string());

    let total = total_bytes.max(1);

    for retainer in retainers.iter().take(max_lines) {
        let percentage = (retainer.inclusive_bytes as f64 / total as f64) * 100.0;
        let color = get_ansi_color(&retainer.kind);
        let reset = "\x1b[0m";

        // Truncate description if too long for display
        let char_count = retainer.description.chars().count();
        let display = if char_count > 42 {
            let tail: String = retainer.description.chars().skip(char_count - 39).collect();
            format!("...{}", tail)
        } else {
            retainer.description.clone()
        };

        lines.push(format!(
            "  ┃ {}{:<42}{} ┃ {:>12} ┃ {:>12} ┃ {:>6.1}% ┃",
            color,
            display,
            reset,
            format_bytes(retainer.inclusive_bytes),
            format_bytes(retainer.exclusive_bytes),
            percentage
        ));
    }

    lines.push("  ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━┻━━━━━━━━━┛".to_string());

    // Simplified bar chart
    lines.push("".to_string());
    lines.push("  RETENTION".to_string());
    lines.push("  process ██████████████████████████████████████████████████ 100%".to_string());

    for retainer in retainers.iter().take(5) {
        let percentage = (retainer.inclusive_bytes as f64 / total as f64) * 100.0;
        let bar_width = (percentage / 2.0) as usize; // Max 50 chars
        let bar = "█".repeat(bar_width);
        let color = get_ansi_color(&retainer.kind);
        let reset = "\x1b[0m";
        let short: String = retainer.description.chars().take(20).collect();

        lines.push(format!(
            "  └─ {}{:<20}{} {}{:50}{} {:>5.1}%",
            color, short, reset, color, bar, reset, percentage
        ));
    }

    if retainers.len() > max_lines {
        lines.push("".to_string());
        lines.push(format!(
            "   (Showing top {} of {} retainers)",
            max_lines,
            retainers.len()
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stacks() -> Vec<CollapsedStack> {
        vec![
            CollapsedStack::new("process;static App.s_cache;Dictionary".to_string(), 600),
            CollapsedStack::new("process;static App.s_cache;Dictionary;Entry[]".to_string(), 300),
            CollapsedStack::new("process;gc_handle pinned;Byte[]".to_string(), 100),
        ]
    }

    #[test]
    fn test_generate_flamegraph() {
        let svg = generate_flamegraph(&sample_stacks(), None).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Heap Retention"));
        assert!(svg.contains("Dictionary (900 bytes)"));
        assert!(svg.contains("all (1000 bytes)"));
    }

    #[test]
    fn test_generate_flamegraph_empty() {
        assert!(matches!(
            generate_flamegraph(&[], None),
            Err(FlamegraphError::EmptyStacks)
        ));
    }

    #[test]
    fn test_title_is_escaped() {
        let config = FlamegraphConfig::new().with_title("a <b> & c").with_width(800);
        let svg = generate_flamegraph(&sample_stacks(), Some(&config)).unwrap();
        assert!(svg.contains("a &lt;b&gt; &amp; c"));
        assert!(svg.contains(r#"width="800""#));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_text_summary() {
        let retainers = vec![Retainer {
            node: 3,
            kind: "object".to_string(),
            description: "Dictionary @ 0x1000".to_string(),
            exclusive_bytes: 600,
            inclusive_bytes: 900,
            percentage: 90.0,
        }];
        let summary = generate_text_summary(&retainers, 10, 1000);
        assert!(summary.contains("Dictionary @ 0x1000"));
        assert!(summary.contains("90.0%"));
        assert!(!summary.contains("Showing top"));
    }
}
