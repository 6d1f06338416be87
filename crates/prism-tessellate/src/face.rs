//! Face view lists: outlines and fills.

use prism_math::{Plane, Point2, Point3};
use prism_tree::{FaceId, FaceKind, FaceView, LoopEdge, ObjId, Tree};
use tracing::debug;

use crate::edge::{edge_polyline, segment_count};
use crate::{Result, TessellateError, TessellationParams};

/// Regenerate the outline and fill of a face.
///
/// The outline concatenates the polylines of the boundary in loop order,
/// each step contributing every point but its last. Planar faces are filled
/// by ear clipping in their plane; ruled faces by a triangle strip between
/// their two curved sides. Fill triangles wind counter-clockwise about the
/// face's loop direction. A face with no edges gets an empty, valid view.
pub fn gen_view_list_face(tree: &mut Tree, face: FaceId, params: &TessellationParams) -> Result<()> {
    let f = tree.face(face)?;
    let (kind, plane, ident) = (f.kind, f.plane, f.header.ident);
    if f.edges.is_empty() {
        tree.faces[face].view = FaceView {
            valid: true,
            ..FaceView::default()
        };
        return Ok(());
    }

    let order = tree.face_loop(face)?;
    let outline = outline(tree, &order, params)?;
    let (fill_points, triangles) = if kind.is_planar() {
        let triangles = fill_planar(&outline, &plane).ok_or_else(|| TessellateError::Degenerate {
            ident,
            message: format!("{} outline points enclose no area", outline.len()),
        })?;
        (outline.clone(), triangles)
    } else {
        fill_ruled(tree, face, &order, params)?
    };

    debug!(
        ident,
        outline = outline.len(),
        triangles = triangles.len(),
        "generated face view list"
    );
    tree.faces[face].view = FaceView {
        outline,
        fill_points,
        triangles,
        valid: true,
    };
    Ok(())
}

/// The view list of a face, regenerated first if stale.
pub fn face_view<'a>(
    tree: &'a mut Tree,
    face: FaceId,
    params: &TessellationParams,
) -> Result<&'a FaceView> {
    if !tree.view_valid(ObjId::Face(face)) {
        gen_view_list_face(tree, face, params)?;
    }
    Ok(&tree.face(face)?.view)
}

fn outline(tree: &mut Tree, order: &[LoopEdge], params: &TessellationParams) -> Result<Vec<Point3>> {
    let mut out = Vec::new();
    for step in order {
        let mut line = edge_polyline(tree, step.edge, params)?;
        if step.reversed {
            line.reverse();
        }
        line.pop();
        out.extend(line);
    }
    Ok(out)
}

/// Ear-clip an outline projected into `plane`. Falls back to the outline's
/// own best-fit plane when `plane` has no normal.
fn fill_planar(outline: &[Point3], plane: &Plane) -> Option<Vec<[u32; 3]>> {
    let plane = if plane.has_normal() {
        *plane
    } else {
        Plane::from_points(outline)?
    };
    let pts: Vec<Point2> = outline.iter().map(|p| plane.project(p)).collect();
    let area = signed_area(&pts);
    if area.abs() < 1e-14 {
        return None;
    }
    let mut ring: Vec<usize> = (0..pts.len()).collect();
    if area < 0.0 {
        ring.reverse();
    }
    Some(ear_clip(&pts, ring))
}

fn signed_area(pts: &[Point2]) -> f64 {
    let n = pts.len();
    (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn cross(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Ear clipping of a counter-clockwise ring of indices into `pts`.
fn ear_clip(pts: &[Point2], mut ring: Vec<usize>) -> Vec<[u32; 3]> {
    let mut out = Vec::with_capacity(ring.len().saturating_sub(2));
    while ring.len() > 3 {
        let n = ring.len();
        let corner = |i: usize| {
            (
                ring[(i + n - 1) % n],
                ring[i],
                ring[(i + 1) % n],
            )
        };

        let ear = (0..n).find(|&i| {
            let (prev, cur, next) = corner(i);
            let (a, b, c) = (pts[prev], pts[cur], pts[next]);
            if cross(a, b, c) <= 1e-14 {
                return false;
            }
            ring.iter()
                .map(|&j| pts[j])
                .filter(|&p| p != a && p != b && p != c)
                .all(|p| !point_in_triangle_2d(p, a, b, c))
        });
        if let Some(i) = ear {
            let (prev, cur, next) = corner(i);
            out.push([prev as u32, cur as u32, next as u32]);
            ring.remove(i);
            continue;
        }

        // No ear: drop a collinear vertex, or fan the rest.
        let flat = (0..n).find(|&i| {
            let (prev, cur, next) = corner(i);
            cross(pts[prev], pts[cur], pts[next]).abs() <= 1e-14
        });
        match flat {
            Some(i) => {
                ring.remove(i);
            }
            None => {
                for i in 1..n - 1 {
                    out.push([ring[0] as u32, ring[i] as u32, ring[i + 1] as u32]);
                }
                return out;
            }
        }
    }
    if ring.len() == 3 && cross(pts[ring[0]], pts[ring[1]], pts[ring[2]]) > 1e-14 {
        out.push([ring[0] as u32, ring[1] as u32, ring[2] as u32]);
    }
    out
}

/// Barycentric point-in-triangle test; points on the boundary count as
/// inside, so a reflex vertex on the diagonal blocks the ear.
fn point_in_triangle_2d(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < 1e-300 {
        return false;
    }
    let u = (dot11 * dot02 - dot01 * dot12) / denom;
    let v = (dot00 * dot12 - dot01 * dot02) / denom;

    let eps = 1e-10;
    u >= -eps && v >= -eps && (u + v) <= 1.0 + eps
}

/// Strip between loop steps 0 and 2 of a ruled face.
///
/// Both sides are sampled at the same number of parameters and joined by
/// rungs. Side 2 is paired in whichever direction gives the shorter rungs.
/// Triangles follow the direction side 0 is walked; a closed side 0 (the
/// wall of an extruded circle) has no walk direction and faces away from
/// the cylinder axis instead.
fn fill_ruled(
    tree: &Tree,
    face: FaceId,
    order: &[LoopEdge],
    params: &TessellationParams,
) -> Result<(Vec<Point3>, Vec<[u32; 3]>)> {
    let f = tree.face(face)?;
    let ident = f.header.ident;
    if order.len() != 4 {
        return Err(TessellateError::Degenerate {
            ident,
            message: format!(
                "{:?} face needs 4 boundary steps, found {}",
                f.kind,
                order.len()
            ),
        });
    }
    let (s0, s2) = (order[0], order[2]);
    let e0 = tree.edge(s0.edge)?;
    let e2 = tree.edge(s2.edge)?;
    let n = segment_count(tree, e0, params)?.max(segment_count(tree, e2, params)?) as usize;
    let frac = |i: usize| i as f64 / n as f64;

    let mut points = (0..=n)
        .map(|i| tree.edge_point_at(e0, s0.param(frac(i))))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let forward = (0..=n)
        .map(|i| tree.edge_point_at(e2, frac(i)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let straight = rung_length(&points, forward.iter());
    let crossed = rung_length(&points, forward.iter().rev());
    if crossed < straight {
        points.extend(forward.into_iter().rev());
    } else {
        points.extend(forward);
    }

    let q = (n + 1) as u32;
    let mut triangles: Vec<[u32; 3]> = (0..n as u32)
        .flat_map(|i| [[i, i + 1, q + i + 1], [i, q + i + 1, q + i]])
        .collect();

    if e0.is_closed() && f.kind == FaceKind::Cylinder && f.plane.has_normal() {
        let axis = f.plane;
        let outward: f64 = triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| points[i as usize]);
                let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                let d = centroid - axis.origin;
                let radial = d - axis.normal * d.dot(&axis.normal);
                (b - a).cross(&(c - a)).dot(&radial)
            })
            .sum();
        if outward < 0.0 {
            for t in &mut triangles {
                t.swap(1, 2);
            }
        }
    }
    Ok((points, triangles))
}

fn rung_length<'a>(side: &[Point3], other: impl Iterator<Item = &'a Point3>) -> f64 {
    side.iter().zip(other).map(|(p, q)| (q - p).norm()).sum()
}
