//! Edge view lists: interior polylines of arcs and beziers.

use prism_math::{bezier_segments, cubic_bezier, Point3};
use prism_tree::{Edge, EdgeId, EdgeKind, EdgeView, Tree};
use tracing::debug;

use crate::{Result, TessellateError, TessellationParams};

/// Number of segments an edge is split into.
pub(crate) fn segment_count(tree: &Tree, edge: &Edge, params: &TessellationParams) -> Result<u32> {
    match edge.kind {
        EdgeKind::Straight => Ok(1),
        EdgeKind::Arc { .. } => {
            let arc = tree.arc_geom(edge)?;
            let n = match edge.step {
                Some(step) => arc.segments_for_step(step, params.max_segments),
                None => arc.segments_for_flatness(params.flatness, params.max_segments),
            };
            Ok(if arc.is_full_circle() { n.max(3) } else { n })
        }
        EdgeKind::Bezier { ctrl } => {
            let max = params.max_segments.max(1);
            match edge.step {
                Some(step) if step > 1e-12 => Ok(((1.0 / step).ceil() as u32).clamp(1, max)),
                _ => {
                    let p0 = tree.pos(edge.endpoints[0])?;
                    let p1 = tree.pos(edge.endpoints[1])?;
                    let c0 = tree.pos(ctrl[0])?;
                    let c1 = tree.pos(ctrl[1])?;
                    Ok(bezier_segments(&p0, &c0, &c1, &p1, params.flatness, max))
                }
            }
        }
    }
}

fn store(tree: &mut Tree, edge: EdgeId, interior: Vec<Point3>) {
    let view = &mut tree.edges[edge].view;
    view.interior = interior;
    view.valid = true;
}

/// Regenerate the view list of an arc edge.
///
/// The interior holds the `n - 1` points strictly between the endpoints,
/// where `n` comes from the edge's explicit angular step or, failing that,
/// from the flatness tolerance. A full circle gets at least three segments.
pub fn gen_view_list_arc(tree: &mut Tree, edge: EdgeId, params: &TessellationParams) -> Result<()> {
    let e = tree.edge(edge)?;
    if !matches!(e.kind, EdgeKind::Arc { .. }) {
        return Err(TessellateError::WrongKind {
            ident: e.header.ident,
            expected: "an arc",
        });
    }
    let arc = tree.arc_geom(e)?;
    let n = segment_count(tree, e, params)?;
    let interior: Vec<Point3> = (1..n).map(|i| arc.point_at(i as f64 / n as f64)).collect();
    debug!(segments = n, "generated arc view list");
    store(tree, edge, interior);
    Ok(())
}

/// Regenerate the view list of a bezier edge.
///
/// An explicit step is a parameter fraction; without one the segment count
/// follows the flatness tolerance.
pub fn gen_view_list_bez(tree: &mut Tree, edge: EdgeId, params: &TessellationParams) -> Result<()> {
    let e = tree.edge(edge)?;
    let EdgeKind::Bezier { ctrl } = e.kind else {
        return Err(TessellateError::WrongKind {
            ident: e.header.ident,
            expected: "a bezier",
        });
    };
    let p0 = tree.pos(e.endpoints[0])?;
    let p1 = tree.pos(e.endpoints[1])?;
    let c0 = tree.pos(ctrl[0])?;
    let c1 = tree.pos(ctrl[1])?;
    let n = segment_count(tree, e, params)?;
    let interior: Vec<Point3> = (1..n)
        .map(|i| cubic_bezier(&p0, &c0, &c1, &p1, i as f64 / n as f64))
        .collect();
    debug!(segments = n, "generated bezier view list");
    store(tree, edge, interior);
    Ok(())
}

/// The view list of an edge, regenerated first if stale.
pub fn edge_view<'a>(
    tree: &'a mut Tree,
    edge: EdgeId,
    params: &TessellationParams,
) -> Result<&'a EdgeView> {
    let e = tree.edge(edge)?;
    if !e.view.valid {
        match e.kind {
            EdgeKind::Straight => store(tree, edge, Vec::new()),
            EdgeKind::Arc { .. } => gen_view_list_arc(tree, edge, params)?,
            EdgeKind::Bezier { .. } => gen_view_list_bez(tree, edge, params)?,
        }
    }
    Ok(&tree.edge(edge)?.view)
}

/// Full polyline of an edge from its first endpoint to its second.
pub fn edge_polyline(
    tree: &mut Tree,
    edge: EdgeId,
    params: &TessellationParams,
) -> Result<Vec<Point3>> {
    let interior = edge_view(tree, edge, params)?.interior.clone();
    let e = tree.edge(edge)?;
    let mut out = Vec::with_capacity(interior.len() + 2);
    out.push(tree.pos(e.endpoints[0])?);
    out.extend(interior);
    out.push(tree.pos(e.endpoints[1])?);
    Ok(out)
}
