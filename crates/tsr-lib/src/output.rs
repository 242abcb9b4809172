use std::fmt::Write;

use serde::Serialize;

use crate::features::GradientCurves;
use crate::mesh::{Point3, VertexId};
use crate::state::{FailedRoute, FinalizedRoute, RouteWarning};

/// Gradient above which a segment is reported as steep.
pub const STEEP_GRADIENT: f64 = 0.3;

/// Gradient above which a segment is reported as slight.
pub const SLIGHT_GRADIENT: f64 = 0.2;

/// Presentation style for turning a [`RouteSummary`] into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRenderMode {
    PlainText,
    RichText,
}

/// Steepness class of the segment leading into a step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentGrade {
    Flat,
    Slight,
    Steep,
}

impl SegmentGrade {
    /// Classify by absolute gradient.
    pub fn classify(gradient: f64) -> Self {
        let magnitude = gradient.abs();
        if magnitude > STEEP_GRADIENT {
            SegmentGrade::Steep
        } else if magnitude > SLIGHT_GRADIENT {
            SegmentGrade::Slight
        } else {
            SegmentGrade::Flat
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SegmentGrade::Flat => "flat",
            SegmentGrade::Slight => "slight",
            SegmentGrade::Steep => "steep",
        }
    }
}

/// Vertex visited by a route.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteStep {
    pub index: usize,
    pub vertex: VertexId,
    pub point: Point3,
    /// Grade of the segment ending here; absent for the first step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<SegmentGrade>,
}

/// Structured representation of a finalized route that consumers can serialise.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteSummary {
    pub start: VertexId,
    pub goal: VertexId,
    pub hops: usize,
    pub total_cost: f64,
    pub length: f64,
    /// Omitted when the route contains a segment nobody can walk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<f64>,
    pub steps: Vec<RouteStep>,
    pub warnings: Vec<RouteWarning>,
}

impl RouteSummary {
    /// Summarise `route`, estimating travel time at `base_speed` metres per second.
    pub fn from_route(route: &FinalizedRoute, curves: &GradientCurves, base_speed: f64) -> Self {
        let points = route.points();
        let steps = route
            .vertices()
            .iter()
            .zip(points)
            .enumerate()
            .map(|(index, (&vertex, &point))| RouteStep {
                index,
                vertex,
                point,
                grade: index
                    .checked_sub(1)
                    .map(|previous| SegmentGrade::classify(points[previous].gradient_to(&point))),
            })
            .collect::<Vec<_>>();

        let duration = route.estimated_duration(curves, base_speed);
        Self {
            start: route.start_vertex(),
            goal: route.end_vertex(),
            hops: steps.len().saturating_sub(1),
            total_cost: route.total_cost(),
            length: route.length(),
            estimated_seconds: duration.is_finite().then_some(duration),
            steps,
            warnings: route.warnings().to_vec(),
        }
    }

    /// Render the summary using the requested textual mode.
    pub fn render(&self, mode: RouteRenderMode) -> String {
        match mode {
            RouteRenderMode::PlainText => self.render_plain(),
            RouteRenderMode::RichText => self.render_rich(),
        }
    }

    fn estimate_label(&self) -> String {
        self.estimated_seconds
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn render_plain(&self) -> String {
        let mut buffer = String::new();
        let _ = writeln!(
            buffer,
            "Route: {} -> {} ({} hops, {:.1} m, cost {:.2}, time {})",
            self.start,
            self.goal,
            self.hops,
            self.length,
            self.total_cost,
            self.estimate_label()
        );
        for step in &self.steps {
            let grade = step.grade.map(SegmentGrade::label).unwrap_or("start");
            let _ = writeln!(
                buffer,
                "{:>3}: {} ({:.1}, {:.1}, {:.1}) {}",
                step.index, step.vertex, step.point.x, step.point.y, step.point.z, grade
            );
        }
        for warning in &self.warnings {
            let _ = writeln!(
                buffer,
                "warning [{}] face {}: {}",
                warning.severity, warning.face, warning.message
            );
        }
        buffer
    }

    fn render_rich(&self) -> String {
        let mut buffer = String::new();
        let _ = writeln!(
            buffer,
            "**Route** _{} to {}_ ({} hops, {:.1} m, `{}`)",
            self.start,
            self.goal,
            self.hops,
            self.length,
            self.estimate_label()
        );
        for step in &self.steps {
            let _ = write!(buffer, "* {:>2}. **{}**", step.index, step.vertex);
            match step.grade {
                Some(SegmentGrade::Flat) | None => {
                    let _ = writeln!(buffer);
                }
                Some(grade) => {
                    let _ = writeln!(buffer, " _{}_", grade.label());
                }
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(buffer, "\n**Warnings**");
            for warning in &self.warnings {
                let _ = writeln!(
                    buffer,
                    "* `{}` {} (face {})",
                    warning.severity, warning.message, warning.face
                );
            }
        }
        buffer
    }
}

/// Report for a route that could not be found, listing every known hazard.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureSummary {
    pub start: VertexId,
    pub goal: VertexId,
    pub reason: String,
    pub warnings: Vec<RouteWarning>,
}

impl FailureSummary {
    pub fn from_failure(failure: &FailedRoute) -> Self {
        Self {
            start: failure.start_vertex,
            goal: failure.end_vertex,
            reason: failure.reason.clone(),
            warnings: failure.warnings.clone(),
        }
    }

    pub fn render(&self, mode: RouteRenderMode) -> String {
        let mut buffer = String::new();
        match mode {
            RouteRenderMode::PlainText => {
                let _ = writeln!(
                    buffer,
                    "No route: {} -> {} ({})",
                    self.start, self.goal, self.reason
                );
                for warning in &self.warnings {
                    let _ = writeln!(
                        buffer,
                        "warning [{}] face {}{}: {}",
                        warning.severity,
                        warning.face,
                        location_label(warning.location),
                        warning.message
                    );
                }
            }
            RouteRenderMode::RichText => {
                let _ = writeln!(
                    buffer,
                    "**No route** _{} to {}_ ({})",
                    self.start, self.goal, self.reason
                );
                if !self.warnings.is_empty() {
                    let _ = writeln!(buffer, "\n**Warnings**");
                    for warning in &self.warnings {
                        let _ = writeln!(
                            buffer,
                            "* `{}` {} (face {}{})",
                            warning.severity,
                            warning.message,
                            warning.face,
                            location_label(warning.location)
                        );
                    }
                }
            }
        }
        buffer
    }
}

fn location_label(location: Option<Point3>) -> String {
    location
        .map(|point| format!(" at ({:.1}, {:.1}, {:.1})", point.x, point.y, point.z))
        .unwrap_or_default()
}

/// Format seconds as `HH:MM:SS`, rounding to the nearest second.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}
