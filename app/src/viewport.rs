use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;

/// A 1-D affine map from a genome coordinate interval (`domain`) to a
/// pixel interval (`range`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: [f64; 2],
    pub range: [f64; 2],
}

impl LinearScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (x - d0) / (d1 - d0) * (r1 - r0)
    }

    pub fn invert(&self, y: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if r1 == r0 {
            return (d0 + d1) / 2.0;
        }
        d0 + (y - r0) / (r1 - r0) * (d1 - d0)
    }

    pub fn domain_width(&self) -> f64 {
        (self.domain[1] - self.domain[0]).abs()
    }

    pub fn range_center(&self) -> f64 {
        (self.range[0] + self.range[1]) / 2.0
    }
}

/// The visible genome interval on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewDomains {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

/// A zoom behavior over two base scales: pixel `p` of the zoomed view
/// shows base pixel `(p - translate) / k`, per axis.
///
/// Gestures keep both zoom factors equal; fitting independent domains
/// can leave them different.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTransform {
    pub x_base: LinearScale,
    pub y_base: LinearScale,
    pub translate: [f64; 2],
    pub k: [f64; 2],
}

impl ZoomTransform {
    pub fn new(x_base: LinearScale, y_base: LinearScale) -> Self {
        Self {
            x_base,
            y_base,
            translate: [0.0, 0.0],
            k: [1.0, 1.0],
        }
    }

    fn zoomed_domain(base: &LinearScale, t: f64, k: f64) -> [f64; 2] {
        base.range.map(|p| base.invert((p - t) / k))
    }

    fn centered(base: &LinearScale, c: f64, k: f64) -> f64 {
        base.range_center() - k * base.apply(c)
    }

    /// The `(translate, k)` that shows exactly `domain` on `base`.
    fn fitted(base: &LinearScale, domain: [f64; 2]) -> (f64, f64) {
        let width = (domain[1] - domain[0]).abs();
        let k = if width > 0.0 {
            base.domain_width() / width
        } else {
            1.0
        };
        let c = (domain[0] + domain[1]) / 2.0;
        (Self::centered(base, c, k), k)
    }

    pub fn domains(&self) -> ViewDomains {
        let [tx, ty] = self.translate;
        let [kx, ky] = self.k;
        ViewDomains {
            x: Self::zoomed_domain(&self.x_base, tx, kx),
            y: Self::zoomed_domain(&self.y_base, ty, ky),
        }
    }

    pub fn base_domains(&self) -> ViewDomains {
        ViewDomains {
            x: self.x_base.domain,
            y: self.y_base.domain,
        }
    }

    /// Zooms by `k` and pans so that genome coordinates `(cx, cy)` sit
    /// at the center of the view.
    pub fn set_centers(&mut self, cx: f64, cy: f64, k: f64) {
        self.k = [k, k];
        self.translate = [
            Self::centered(&self.x_base, cx, k),
            Self::centered(&self.y_base, cy, k),
        ];
    }

    /// Zooms and pans each axis so it shows exactly the given domain.
    pub fn fit(&mut self, domains: ViewDomains) {
        let (tx, kx) = Self::fitted(&self.x_base, domains.x);
        let (ty, ky) = Self::fitted(&self.y_base, domains.y);
        self.translate = [tx, ty];
        self.k = [kx, ky];
    }
}

/// The externally owned view. The search box reads domains, writes them
/// on submit, and listens for changes made by pan/zoom gestures.
pub trait Viewport: Send + Sync {
    fn domains(&self) -> ViewDomains;

    fn base_domains(&self) -> ViewDomains;

    /// Sets each axis domain independently; `None` leaves that axis as is.
    fn set_domains(&self, x: [f64; 2], y: Option<[f64; 2]>);

    /// Moves both axes with one shared zoom factor.
    fn set_centers(&self, cx: f64, cy: f64, k: f64);

    fn subscribe(&self) -> (ListenerId, Receiver<ViewDomains>);

    fn unsubscribe(&self, id: ListenerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// In-process viewport driven by a `ZoomTransform`.
///
/// Domains set explicitly are reported exactly as given until the next
/// zoom; the transform is fitted to them at the same time, so gestures
/// continue from the domains on screen.
#[derive(Debug)]
pub struct LocalViewport {
    transform: AtomicCell<ZoomTransform>,
    exact: AtomicCell<Option<ViewDomains>>,
    listeners: Mutex<Vec<(ListenerId, Sender<ViewDomains>)>>,
    next_listener: AtomicCell<usize>,
}

impl LocalViewport {
    pub fn new(x_base: LinearScale, y_base: LinearScale) -> Self {
        Self {
            transform: AtomicCell::new(ZoomTransform::new(x_base, y_base)),
            exact: AtomicCell::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicCell::new(0),
        }
    }

    /// A square view of `pixels` showing the genome `[0, genome_len)` on
    /// both axes.
    pub fn square(genome_len: f64, pixels: f64) -> Self {
        let scale = LinearScale::new([0.0, genome_len], [0.0, pixels]);
        Self::new(scale, scale)
    }

    pub fn transform(&self) -> ZoomTransform {
        self.transform.load()
    }

    /// Replaces the base domains (e.g. after an assembly switch) and
    /// resets the zoom.
    pub fn reset_base_domains(&self, x: [f64; 2], y: [f64; 2]) {
        let mut t = self.transform.load();
        t.x_base.domain = x;
        t.y_base.domain = y;
        t.translate = [0.0, 0.0];
        t.k = [1.0, 1.0];
        self.transform.store(t);
        self.exact.store(None);
        self.notify();
    }

    /// Applies a pan/zoom gesture result.
    pub fn zoom(&self, translate: [f64; 2], k: f64) {
        let mut t = self.transform.load();
        t.translate = translate;
        t.k = [k, k];
        self.transform.store(t);
        self.exact.store(None);
        self.notify();
    }

    /// Scales the view by `factor` around its center; `factor > 1`
    /// zooms in.
    pub fn zoom_by(&self, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let scale = |d: [f64; 2]| {
            let c = (d[0] + d[1]) / 2.0;
            let half = (d[1] - d[0]) / (2.0 * factor);
            [c - half, c + half]
        };
        let d = self.domains();
        self.fit_exact(ViewDomains {
            x: scale(d.x),
            y: scale(d.y),
        });
    }

    /// Pans the x axis by a fraction of the visible width.
    pub fn pan_by(&self, fraction: f64) {
        let d = self.domains();
        let dx = (d.x[1] - d.x[0]) * fraction;
        self.fit_exact(ViewDomains {
            x: [d.x[0] + dx, d.x[1] + dx],
            y: d.y,
        });
    }

    fn fit_exact(&self, domains: ViewDomains) {
        let mut t = self.transform.load();
        t.fit(domains);
        self.transform.store(t);
        self.exact.store(Some(domains));
        self.notify();
    }

    fn notify(&self) {
        let domains = self.domains();
        self.listeners
            .lock()
            .retain(|(_, tx)| tx.send(domains).is_ok());
    }
}

impl Viewport for LocalViewport {
    fn domains(&self) -> ViewDomains {
        self.exact
            .load()
            .unwrap_or_else(|| self.transform.load().domains())
    }

    fn base_domains(&self) -> ViewDomains {
        self.transform.load().base_domains()
    }

    fn set_domains(&self, x: [f64; 2], y: Option<[f64; 2]>) {
        let current = self.domains();
        self.fit_exact(ViewDomains {
            x,
            y: y.unwrap_or(current.y),
        });
    }

    fn set_centers(&self, cx: f64, cy: f64, k: f64) {
        let mut t = self.transform.load();
        t.set_centers(cx, cy, k);
        self.transform.store(t);
        self.exact.store(None);
        self.notify();
    }

    fn subscribe(&self) -> (ListenerId, Receiver<ViewDomains>) {
        let id = ListenerId(self.next_listener.fetch_add(1));
        let (tx, rx) = crossbeam::channel::unbounded();
        self.listeners.lock().push((id, tx));
        (id, rx)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(l, _)| *l != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6
    }

    #[test]
    fn linear_scale() {
        let s = LinearScale::new([0.0, 1000.0], [0.0, 100.0]);
        assert_eq!(s.apply(500.0), 50.0);
        assert_eq!(s.invert(25.0), 250.0);
        assert_eq!(s.domain_width(), 1000.0);
    }

    #[test]
    fn zoomed_domains() {
        let mut t = ZoomTransform::new(
            LinearScale::new([0.0, 1000.0], [0.0, 100.0]),
            LinearScale::new([0.0, 1000.0], [0.0, 100.0]),
        );
        assert!(approx(t.domains().x, [0.0, 1000.0]));

        // zoom 2x, then shift left by 50 px
        t.k = [2.0, 2.0];
        t.translate = [-50.0, 0.0];
        assert!(approx(t.domains().x, [250.0, 750.0]));
        assert!(approx(t.domains().y, [0.0, 500.0]));

        t.set_centers(100.0, 900.0, 4.0);
        assert!(approx(t.domains().x, [-25.0, 225.0]));
        assert!(approx(t.domains().y, [775.0, 1025.0]));
    }

    #[test]
    fn fitted_transform_matches_domains() {
        let mut t = ZoomTransform::new(
            LinearScale::new([0.0, 6000.0], [0.0, 600.0]),
            LinearScale::new([0.0, 6000.0], [0.0, 600.0]),
        );
        t.fit(ViewDomains {
            x: [1100.0, 1200.0],
            y: [3000.0, 4500.0],
        });
        assert!(approx(t.k, [60.0, 4.0]));
        assert!(approx(t.domains().x, [1100.0, 1200.0]));
        assert!(approx(t.domains().y, [3000.0, 4500.0]));
    }

    #[test]
    fn listeners_receive_changes() {
        let view = LocalViewport::square(1000.0, 100.0);
        let (id, rx) = view.subscribe();

        view.set_domains([10.0, 20.0], None);
        let d = rx.try_recv().unwrap();
        assert_eq!(d.x, [10.0, 20.0]);
        assert!(approx(d.y, [0.0, 1000.0]));
        assert_eq!(view.domains(), d);

        view.zoom_by(2.0);
        let d = rx.try_recv().unwrap();
        assert!(approx(d.x, [12.5, 17.5]));
        assert!(approx(d.y, [250.0, 750.0]));

        view.unsubscribe(id);
        view.pan_by(0.5);
        assert!(rx.try_recv().is_err());
        assert!(approx(view.domains().x, [15.0, 20.0]));
    }

    #[test]
    fn gestures_continue_from_set_domains() {
        let view = LocalViewport::square(1000.0, 100.0);

        view.set_domains([100.0, 200.0], None);
        view.zoom_by(1.0);
        assert!(approx(view.domains().x, [100.0, 200.0]));

        // the fitted transform agrees with the domains on screen
        let t = view.transform();
        assert!(approx(t.domains().x, [100.0, 200.0]));
        assert!(approx(t.k, [10.0, 1.0]));

        // a shared-zoom move afterwards starts from the fitted transform
        view.set_centers(150.0, 500.0, 10.0);
        assert!(approx(view.domains().x, [100.0, 200.0]));
        assert!(approx(view.domains().y, [450.0, 550.0]));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let view = LocalViewport::square(1000.0, 100.0);
        let (_, rx) = view.subscribe();
        drop(rx);
        view.zoom([0.0, 0.0], 1.0);
        assert!(view.listeners.lock().is_empty());
    }
}
