use std::borrow::Cow;
use std::fmt::Write as FmtWrite;

use log::info;
#[cfg(feature = "png")]
use tiny_skia::{Pixmap, Transform};

use crate::error::RenderError;
use crate::graph::{NodeKind, Point, SchemaGraph, SchemaNode, Side};

const LAYOUT_MARGIN: f32 = 40.0;
const EDGE_COLOR: &str = "#b1b1b7";
const LABEL_COLOR: &str = "#1a192b";

/// Render the positioned graph as a standalone SVG document.
///
/// Edges are drawn as orthogonal step paths between the connector sides
/// chosen by the last layout pass.
pub fn render_svg(graph: &SchemaGraph, background: &str) -> Result<String, RenderError> {
    let bounds = graph.bounds().ok_or(RenderError::EmptyDiagram)?;

    let width = bounds.width() + LAYOUT_MARGIN * 2.0;
    let height = bounds.height() + LAYOUT_MARGIN * 2.0;
    let shift = Point::new(LAYOUT_MARGIN - bounds.min_x, LAYOUT_MARGIN - bounds.min_y);

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <defs>
    <marker id="arrow-end" markerWidth="10" markerHeight="10" refX="8" refY="5" orient="auto" markerUnits="userSpaceOnUse">
      <path d="M1,1 L8,5 L1,9 z" fill="{}" />
    </marker>
  </defs>
  <rect width="100%" height="100%" fill="{}" />
"##,
        width,
        height,
        width,
        height,
        EDGE_COLOR,
        escape_xml(background)
    )?;

    for edge in &graph.edges {
        let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target))
        else {
            continue;
        };

        let path = step_path(source, target, shift);
        writeln!(
            svg,
            "  <path data-edge=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\" marker-end=\"url(#arrow-end)\" />",
            escape_xml(&edge.id),
            path,
            EDGE_COLOR
        )?;
    }

    for node in &graph.nodes {
        let x = node.position.x + shift.x;
        let y = node.position.y + shift.y;

        writeln!(
            svg,
            "  <g data-node=\"{}\">",
            escape_xml(&node.id)
        )?;
        if let Some(description) = &node.description {
            writeln!(svg, "    <title>{}</title>", escape_xml(description))?;
        }
        writeln!(
            svg,
            "    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"3\" ry=\"3\" fill=\"white\" stroke=\"{}\" stroke-width=\"1\" />",
            x,
            y,
            node.width,
            node.height,
            stroke_color(node.kind)
        )?;
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"12\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>",
            x + node.width / 2.0,
            y + node.height / 2.0,
            LABEL_COLOR,
            escape_xml(&node.label)
        )?;
        svg.push_str("  </g>\n");
    }

    svg.push_str("</svg>\n");

    info!(
        "rendered svg with {} nodes and {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(svg)
}

/// Rasterize [`render_svg`] output at `scale`.
#[cfg(feature = "png")]
pub fn render_png(graph: &SchemaGraph, background: &str, scale: f32) -> Result<Vec<u8>, RenderError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RenderError::InvalidScale(scale));
    }

    let svg = render_svg(graph, background)?;

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|err| RenderError::Raster(format!("generated svg is invalid: {err}")))?;

    let size = tree.size().to_int_size();
    let scaled_width = (size.width() as f32 * scale).ceil();
    let scaled_height = (size.height() as f32 * scale).ceil();

    if scaled_width < 1.0 || scaled_height < 1.0 {
        return Err(RenderError::Raster(
            "scaled dimensions collapsed below 1px; try a larger scale factor".to_string(),
        ));
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        return Err(RenderError::Raster(
            "scaled dimensions exceed supported limits; try a smaller scale factor".to_string(),
        ));
    }

    let (scaled_width, scaled_height) = (scaled_width as u32, scaled_height as u32);
    let mut pixmap = Pixmap::new(scaled_width, scaled_height).ok_or_else(|| {
        RenderError::Raster(format!(
            "failed to allocate {scaled_width}x{scaled_height} surface"
        ))
    })?;

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| RenderError::Raster(format!("failed to encode png: {err}")))
}

fn stroke_color(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Root | NodeKind::Input => "#0041d0",
        NodeKind::Property => "#1a192b",
        NodeKind::Output => "#ff0072",
    }
}

fn step_path(source: &SchemaNode, target: &SchemaNode, shift: Point) -> String {
    let from = source.source_anchor();
    let to = target.target_anchor();
    let (fx, fy) = (from.x + shift.x, from.y + shift.y);
    let (tx, ty) = (to.x + shift.x, to.y + shift.y);

    let vertical = matches!(source.source_side, None | Some(Side::Top | Side::Bottom));
    if vertical {
        let mid_y = (fy + ty) / 2.0;
        format!("M{fx:.1},{fy:.1} V{mid_y:.1} H{tx:.1} V{ty:.1}")
    } else {
        let mid_x = (fx + tx) / 2.0;
        format!("M{fx:.1},{fy:.1} H{mid_x:.1} V{ty:.1} H{tx:.1}")
    }
}

/// Escape text for use in SVG element content and attribute values.
fn escape_xml(text: &str) -> Cow<'_, str> {
    const SPECIAL: [char; 5] = ['&', '<', '>', '"', '\''];
    if !text.contains(SPECIAL) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        let entity = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            '\'' => "&apos;",
            _ => {
                out.push(ch);
                continue;
            }
        };
        out.push_str(entity);
    }
    Cow::Owned(out)
}
