//! Geometry natives: the only natives that mutate [`crate::render::RenderBuffer`]
//! directly, transforming their vertices through the current matrix-stack
//! top (§4.1 table rows 4 and 9, "geometry natives").
//!
//! Grounded on `original_source/app/c/seni_shapes.c`'s `line`/`rect`/
//! `circle`/`bezier` builders — each walks its control points, transforms
//! them through the active matrix, and appends a triangle-strip batch to
//! the render packet list. The colour defaults to opaque white when the
//! script omits `colour:`, matching the original's fallback.

use crate::error::SeniError;
use crate::error::SeniResult;
use crate::value::{ColourFormat, Value};
use crate::vm::Vm;
use crate::word_table::Iname;

use super::{arg, arg_vec2};

const DEFAULT_COLOUR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const CIRCLE_SEGMENTS: usize = 24;

fn colour_components(args: &[(Iname, Value)]) -> SeniResult<[f32; 4]> {
    match args.iter().find(|(_, v)| matches!(v, Value::Colour(..))) {
        Some((_, Value::Colour(ColourFormat::Rgb, rgba))) => Ok(*rgba),
        Some((_, Value::Colour(_, rgba))) => Ok(*rgba), // non-RGB formats are converted upstream by the colour natives
        Some((_, other)) => Err(SeniError::TypeMismatch { op: "geometry colour", found: other.type_name() }),
        None => Ok(DEFAULT_COLOUR),
    }
}

fn emit_segment(vm: &mut Vm, from: (f32, f32), to: (f32, f32), colour: [f32; 4]) {
    let top = *vm.matrix_stack.top();
    let a = top.transform_point(from.0, from.1);
    let b = top.transform_point(to.0, to.1);
    vm.render.push_vertex(a, colour, (0.0, 0.0));
    vm.render.push_vertex(b, colour, (1.0, 0.0));
}

/// `(line from: p1 to: p2 colour: c)`.
pub fn line(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let from_label = args.first().map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "line", found: "missing 'from'" })?;
    let to_label = args.get(1).map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "line", found: "missing 'to'" })?;
    let from = arg_vec2(args, from_label, (0.0, 0.0))?;
    let to = arg_vec2(args, to_label, (0.0, 0.0))?;
    let colour = colour_components(args)?;
    emit_segment(vm, from, to, colour);
    Ok(Value::Bool(true))
}

/// `(rect position: p width: w height: h colour: c)`.
pub fn rect(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let position_label = args.first().map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "rect", found: "missing 'position'" })?;
    let (x, y) = arg_vec2(args, position_label, (0.0, 0.0))?;
    let width = args.get(1).and_then(|(_, v)| v.as_f32()).unwrap_or(1.0);
    let height = args.get(2).and_then(|(_, v)| v.as_f32()).unwrap_or(1.0);
    let colour = colour_components(args)?;
    let (hw, hh) = (width / 2.0, height / 2.0);
    let corners = [(x - hw, y - hh), (x + hw, y - hh), (x + hw, y + hh), (x - hw, y + hh)];
    for i in 0..4 {
        emit_segment(vm, corners[i], corners[(i + 1) % 4], colour);
    }
    Ok(Value::Bool(true))
}

/// `(circle position: p radius: r colour: c)`, tessellated into a fan of
/// straight segments (§4.1 row 9 render-packet batching applies the same
/// way regardless of which native produced the vertices).
pub fn circle(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let position_label = args.first().map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "circle", found: "missing 'position'" })?;
    let (cx, cy) = arg_vec2(args, position_label, (0.0, 0.0))?;
    let radius = args.get(1).and_then(|(_, v)| v.as_f32()).unwrap_or(1.0);
    let colour = colour_components(args)?;
    let points: Vec<(f32, f32)> = (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let theta = (i as f32 / CIRCLE_SEGMENTS as f32) * std::f32::consts::TAU;
            (cx + radius * theta.cos(), cy + radius * theta.sin())
        })
        .collect();
    for pair in points.windows(2) {
        emit_segment(vm, pair[0], pair[1], colour);
    }
    Ok(Value::Bool(true))
}

/// `(bezier coords: [p0 p1 p2 p3] tessellation: n colour: c)` — a cubic
/// Bezier curve sampled into straight segments.
pub fn bezier(vm: &mut Vm, args: &[(Iname, Value)]) -> SeniResult<Value> {
    let coords_label = args.first().map(|(l, _)| *l).ok_or(SeniError::TypeMismatch { op: "bezier", found: "missing 'coords'" })?;
    let coords = arg(args, coords_label, Value::Vector(None));
    let Value::Vector(head) = coords else {
        return Err(SeniError::TypeMismatch { op: "bezier", found: coords.type_name() });
    };
    let control_points: Vec<(f32, f32)> = vm
        .heap
        .to_vec(head)
        .into_iter()
        .map(|v| match v {
            Value::Vec2(x, y) => Ok((x, y)),
            other => Err(SeniError::TypeMismatch { op: "bezier", found: other.type_name() }),
        })
        .collect::<SeniResult<_>>()?;
    if control_points.len() != 4 {
        return Err(SeniError::TypeMismatch { op: "bezier", found: "coords must have exactly 4 points" });
    }
    let tessellation = args.get(1).map_or(16.0, |(_, v)| v.as_f64().unwrap_or(16.0)) as usize;
    let colour = colour_components(args)?;
    let [p0, p1, p2, p3] = [control_points[0], control_points[1], control_points[2], control_points[3]];
    let sample = |t: f32| -> (f32, f32) {
        let mt = 1.0 - t;
        let x = mt.powi(3) * p0.0 + 3.0 * mt.powi(2) * t * p1.0 + 3.0 * mt * t.powi(2) * p2.0 + t.powi(3) * p3.0;
        let y = mt.powi(3) * p0.1 + 3.0 * mt.powi(2) * t * p1.1 + 3.0 * mt * t.powi(2) * p2.1 + t.powi(3) * p3.1;
        (x, y)
    };
    let mut prev = sample(0.0);
    for i in 1..=tessellation {
        let t = i as f32 / tessellation as f32;
        let next = sample(t);
        emit_segment(vm, prev, next, colour);
        prev = next;
    }
    Ok(Value::Bool(true))
}
