use std::str::FromStr;
use std::sync::Arc;

use genopos_core::codec::{format_expression, parse_expression};
use genopos_core::{CoordError, CoordSpace, PositionExpr, PositionRange};

use crate::viewport::{ViewDomains, Viewport};

/// How the two axes of a 2-D view respond to a submitted position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScaleCoupling {
    /// One zoom factor for both axes, chosen so that both ranges fit.
    #[default]
    Shared,
    /// Each axis gets exactly its own range.
    Independent,
}

impl FromStr for ScaleCoupling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "independent" => Ok(Self::Independent),
            other => anyhow::bail!(
                "unknown scale coupling `{other}`, \
                 expected `shared` or `independent`"
            ),
        }
    }
}

/// What a submitted position does to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewTarget {
    Domains {
        x: [f64; 2],
        y: Option<[f64; 2]>,
    },
    Centers {
        cx: f64,
        cy: f64,
        k: f64,
    },
}

/// Translates between the viewport's domains and position text, for one
/// coordinate space.
pub struct ViewportSync {
    space: Arc<CoordSpace>,
    viewport: Arc<dyn Viewport>,
    two_d: bool,
    coupling: ScaleCoupling,
}

impl ViewportSync {
    pub fn new(
        space: Arc<CoordSpace>,
        viewport: Arc<dyn Viewport>,
        two_d: bool,
        coupling: ScaleCoupling,
    ) -> Self {
        Self {
            space,
            viewport,
            two_d,
            coupling,
        }
    }

    pub fn space(&self) -> &Arc<CoordSpace> {
        &self.space
    }

    pub fn two_d(&self) -> bool {
        self.two_d
    }

    pub fn text_for_domains(&self, domains: ViewDomains) -> Option<String> {
        let x = PositionRange::from_domain(&self.space, domains.x)?;

        let expr = if self.two_d {
            let y = PositionRange::from_domain(&self.space, domains.y)?;
            PositionExpr::two(x, y)
        } else {
            PositionExpr::one(x)
        };

        Some(format_expression(&expr, self.two_d))
    }

    pub fn current_text(&self) -> Option<String> {
        self.text_for_domains(self.viewport.domains())
    }

    pub fn parse(&self, text: &str) -> Result<PositionExpr, CoordError> {
        parse_expression(text, &self.space, self.two_d)
    }

    fn domain(&self, range: &PositionRange) -> Result<[f64; 2], CoordError> {
        let abs = range.to_absolute(&self.space)?;
        // a point still gets one base pair of width
        let end = abs.end.max(abs.start + 1);
        Ok([abs.start as f64, end as f64])
    }

    pub fn target_for(
        &self,
        expr: &PositionExpr,
    ) -> Result<ViewTarget, CoordError> {
        let x = self.domain(&expr.axis1)?;

        // without a second range, the y axis mirrors the first
        let y = match (self.two_d, expr.axis2.as_ref()) {
            (false, _) => None,
            (true, Some(axis2)) => Some(self.domain(axis2)?),
            (true, None) => Some(x),
        };

        let target = match self.coupling {
            ScaleCoupling::Independent => ViewTarget::Domains { x, y },
            ScaleCoupling::Shared => {
                let base = self.viewport.base_domains();
                let zoom = |base: [f64; 2], d: [f64; 2]| {
                    (base[1] - base[0]).abs() / (d[1] - d[0]).max(1.0)
                };
                let center = |d: [f64; 2]| (d[0] + d[1]) / 2.0;

                let kx = zoom(base.x, x);
                let (cy, k) = match y {
                    Some(y) => (center(y), kx.min(zoom(base.y, y))),
                    None => (center(self.viewport.domains().y), kx),
                };

                ViewTarget::Centers {
                    cx: center(x),
                    cy,
                    k,
                }
            }
        };

        let finite = match target {
            ViewTarget::Domains { x, y } => x
                .iter()
                .chain(y.iter().flatten())
                .all(|v| v.is_finite()),
            ViewTarget::Centers { cx, cy, k } => {
                cx.is_finite() && cy.is_finite() && k.is_finite() && k > 0.0
            }
        };

        if !finite {
            return Err(CoordError::ParseFailure {
                text: format_expression(expr, self.two_d),
                reason: "position does not map to a finite view".to_string(),
            });
        }

        Ok(target)
    }

    pub fn push(&self, target: ViewTarget) {
        match target {
            ViewTarget::Domains { x, y } => self.viewport.set_domains(x, y),
            ViewTarget::Centers { cx, cy, k } => {
                self.viewport.set_centers(cx, cy, k)
            }
        }
    }

    /// Parses `text` and moves the viewport to it.
    pub fn apply_text(&self, text: &str) -> Result<ViewTarget, CoordError> {
        let expr = self.parse(text)?;
        let target = self.target_for(&expr)?;
        self.push(target);
        Ok(target)
    }
}
