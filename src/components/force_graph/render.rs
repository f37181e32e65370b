use std::collections::HashMap;
use std::f64::consts::PI;

use force_graph::DefaultNodeIdx;
use web_sys::CanvasRenderingContext2d;

use super::state::{ForceGraphState, NodeVisual};

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

pub fn render(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	let positions = node_positions(state);
	draw_edges(state, ctx, &positions);
	draw_nodes(state, ctx);
	ctx.restore();
	draw_tooltip(state, ctx, &positions);
}

/// Position and radius per node, gathered once per frame.
fn node_positions(state: &ForceGraphState) -> HashMap<DefaultNodeIdx, (f64, f64, f64)> {
	let mut positions = HashMap::new();
	state.graph.visit_nodes(|node| {
		positions.insert(
			node.index(),
			(node.x() as f64, node.y() as f64, node.data.user_data.radius),
		);
	});
	positions
}

fn draw_edges(
	state: &ForceGraphState,
	ctx: &CanvasRenderingContext2d,
	positions: &HashMap<DefaultNodeIdx, (f64, f64, f64)>,
) {
	let k = state.transform.k;
	let arrow_size = 8.0 / k;
	let t = ease_out_cubic(state.hover.highlight_t);

	for edge in state.edges() {
		let (Some(&(x1, y1, source_radius)), Some(&(x2, y2, target_radius))) =
			(positions.get(&edge.source), positions.get(&edge.target))
		else {
			continue;
		};
		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		let is_highlighted =
			state.is_highlighted(edge.source) && state.is_highlighted(edge.target);
		// t=0: all edges at base alpha, t=1: highlighted brighten, others dim
		let (edge_alpha, arrow_alpha, width) = if is_highlighted {
			(0.6 + 0.3 * t, 0.8 + 0.1 * t, edge.width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, 0.8 - 0.45 * t, edge.width * (1.0 - 0.3 * t))
		};

		let (ux, uy) = (dx / dist, dy / dist);
		let (sx, sy) = (x1 + ux * source_radius, y1 + uy * source_radius);
		let margin = if state.arrows_enabled {
			target_radius + arrow_size
		} else {
			target_radius
		};
		let (tx, ty) = (x2 - ux * margin, y2 - uy * margin);

		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", edge_alpha));
		ctx.set_line_width(width / k);
		ctx.begin_path();
		ctx.move_to(sx, sy);
		let (mid_x, mid_y) = if edge.curved {
			// clockwise bow: control point offset perpendicular to the chord
			let offset = dist * edge.roundness;
			let (cx, cy) = (
				(sx + tx) / 2.0 + uy * offset,
				(sy + ty) / 2.0 - ux * offset,
			);
			ctx.quadratic_curve_to(cx, cy, tx, ty);
			// label anchor sits on the curve, not the chord
			(
				(sx + tx) / 2.0 + uy * offset / 2.0,
				(sy + ty) / 2.0 - ux * offset / 2.0,
			)
		} else {
			ctx.line_to(tx, ty);
			((sx + tx) / 2.0, (sy + ty) / 2.0)
		};
		ctx.stroke();

		if state.arrows_enabled {
			ctx.set_fill_style_str(&format!("rgba(100, 180, 255, {})", arrow_alpha));
			let (tip_x, tip_y) = (x2 - ux * target_radius, y2 - uy * target_radius);
			let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
			let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
			ctx.begin_path();
			ctx.move_to(tip_x, tip_y);
			ctx.line_to(back_x + px, back_y + py);
			ctx.line_to(back_x - px, back_y - py);
			ctx.close_path();
			ctx.fill();
		}

		if let Some(label) = &edge.label {
			ctx.set_fill_style_str(&format!("rgba(200, 220, 255, {})", edge_alpha * 0.9));
			ctx.set_font(&format!("{}px sans-serif", state.label_font / k.max(0.5)));
			let _ = ctx.fill_text(label, mid_x + 3.0, mid_y - 3.0);
		}
	}
}

fn draw_shape(ctx: &CanvasRenderingContext2d, visual: &NodeVisual, x: f64, y: f64, radius: f64) {
	ctx.begin_path();
	if visual.shape == "box" {
		ctx.rect(x - radius, y - radius, radius * 2.0, radius * 2.0);
	} else {
		// "dot" and anything unrecognized
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
	}
	ctx.set_fill_style_str(&visual.color);
	ctx.fill();
}

fn draw_nodes(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform.k,
	);

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if has_highlight && state.is_highlighted(idx) {
			return;
		}
		let (x, y) = (node.x() as f64, node.y() as f64);
		let visual = &node.data.user_data;
		let (alpha, radius) = (1.0 - 0.7 * t, visual.radius * (1.0 - 0.15 * t));

		ctx.set_global_alpha(alpha);
		draw_shape(ctx, visual, x, y, radius);
		ctx.set_global_alpha(1.0);

		if let Some(label) = &visual.label {
			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.8));
			ctx.set_font(&format!("{}px sans-serif", state.label_font / k.max(0.5)));
			let _ = ctx.fill_text(label, x + radius + 3.0, y + 3.0);
		}
	});

	if !has_highlight {
		return;
	}

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if !state.is_highlighted(idx) {
			return;
		}
		let (x, y) = (node.x() as f64, node.y() as f64);
		let visual = &node.data.user_data;
		let is_hovered = state.is_hovered(idx);
		let is_neighbor =
			state.hover.neighbors.contains(&idx) || state.hover.prev_neighbors.contains(&idx);

		let (radius, glow_radius) = if is_hovered {
			(
				visual.radius * (1.0 + 0.35 * t),
				visual.radius * (1.8 + 1.2 * t),
			)
		} else if is_neighbor {
			(
				visual.radius * (1.0 + 0.2 * t),
				visual.radius * (1.4 + 0.6 * t),
			)
		} else {
			(visual.radius, 0.0)
		};

		if glow_radius > 0.0
			&& t > 0.01
			&& let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.3, x, y, glow_radius)
		{
			let alpha = if is_hovered { 0.35 * t } else { 0.2 * t };
			let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", alpha));
			let _ =
				gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
			let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
			ctx.begin_path();
			let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
			#[allow(deprecated)]
			ctx.set_fill_style(&gradient);
			ctx.fill();
		}

		draw_shape(ctx, visual, x, y, radius);

		if is_hovered && t > 0.01 {
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + 2.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}

		if let Some(label) = &visual.label {
			ctx.set_fill_style_str("white");
			ctx.set_font(&format!("{}px sans-serif", state.label_font / k.max(0.5)));
			let _ = ctx.fill_text(label, x + radius + 3.0, y + 3.0);
		}
	});
}

/// Property panel for the hovered node, from its title lines.
fn draw_tooltip(
	state: &ForceGraphState,
	ctx: &CanvasRenderingContext2d,
	positions: &HashMap<DefaultNodeIdx, (f64, f64, f64)>,
) {
	let Some(idx) = state.hover.node else {
		return;
	};
	let mut lines: Vec<String> = Vec::new();
	state.graph.visit_nodes(|node| {
		if node.index() == idx {
			lines = node.data.user_data.tooltip.clone();
		}
	});
	if lines.is_empty() {
		return;
	}
	let Some(&(gx, gy, _)) = positions.get(&idx) else {
		return;
	};
	let (sx, sy) = (
		gx * state.transform.k + state.transform.x,
		gy * state.transform.k + state.transform.y,
	);

	let line_height = 16.0;
	let padding = 8.0;
	let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) as f64 * 6.5 + padding * 2.0;
	let height = lines.len() as f64 * line_height + padding * 2.0;
	let (bx, by) = (sx + 16.0, sy - height / 2.0);

	ctx.set_global_alpha(0.9);
	ctx.set_fill_style_str("#16213e");
	ctx.fill_rect(bx, by, width, height);
	ctx.set_stroke_style_str("rgba(100, 180, 255, 0.5)");
	ctx.set_line_width(1.0);
	ctx.stroke_rect(bx, by, width, height);
	ctx.set_global_alpha(1.0);

	ctx.set_fill_style_str("#e0e0e0");
	ctx.set_font("12px sans-serif");
	for (i, line) in lines.iter().enumerate() {
		let _ = ctx.fill_text(line, bx + padding, by + padding + (i as f64 + 0.8) * line_height);
	}
}
