//! Transfer function model.
//!
//! Two curves of control points (color and opacity) are rasterized into a
//! dense RGBA lookup table with [`LUT_SIZE`] entries. Bucket `i` holds the
//! classification of intensity `i / (LUT_SIZE - 1)`.

use std::fmt::Debug;

use glam::{Vec3, Vec4};

use crate::error::{Result, VolrayError};
use crate::preset::Preset;

/// Number of entries in the lookup table.
pub const LUT_SIZE: usize = 4096;

/// Stable identity of a control point, independent of its index in the curve.
pub type PointId = u64;

/// A value that can be linearly interpolated between two control points.
pub trait CurveValue: Copy + PartialEq + Debug {
    /// Interpolates so that `t == 0` yields `a` and `t == 1` yields `b` exactly.
    fn mix(a: Self, b: Self, t: f32) -> Self;
}

impl CurveValue for f32 {
    fn mix(a: Self, b: Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

impl CurveValue for Vec3 {
    fn mix(a: Self, b: Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

/// An anchor in a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint<V> {
    id: PointId,
    /// Intensity in [0, 1].
    pub x: f32,
    pub value: V,
}

impl<V> ControlPoint<V> {
    #[must_use]
    pub fn id(&self) -> PointId {
        self.id
    }
}

/// Bucket index of intensity `x`.
#[must_use]
pub fn bucket(x: f32, len: usize) -> usize {
    let last = len - 1;
    // x is clamped to [0, 1] so the product fits
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let i = (x.clamp(0.0, 1.0) * last as f32).round() as usize;
    i.min(last)
}

/// An ordered sequence of control points.
///
/// Points are sorted ascending by `x`. The first point sits at `x = 0`, the
/// last at `x = 1`, and neither can be moved horizontally or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve<V> {
    points: Vec<ControlPoint<V>>,
    selected: Option<PointId>,
    next_id: PointId,
    revision: u64,
}

impl<V: CurveValue> Curve<V> {
    /// Creates a curve with only its two endpoints.
    pub fn new(start: V, end: V) -> Self {
        Self {
            points: vec![
                ControlPoint {
                    id: 0,
                    x: 0.0,
                    value: start,
                },
                ControlPoint {
                    id: 1,
                    x: 1.0,
                    value: end,
                },
            ],
            selected: None,
            next_id: 2,
            revision: 0,
        }
    }

    /// Builds a curve from `(x, value)` pairs in any order.
    ///
    /// Points are sorted by `x` and the outermost ones are pinned to 0 and 1.
    pub fn from_points(points: impl IntoIterator<Item = (f32, V)>) -> Result<Self> {
        let mut points: Vec<(f32, V)> = points.into_iter().collect();
        if points.len() < 2 {
            return Err(VolrayError::MalformedPreset(format!(
                "a curve needs at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some((x, _)) = points.iter().find(|(x, _)| !x.is_finite()) {
            return Err(VolrayError::MalformedPreset(format!(
                "control point position {x} is not finite"
            )));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let last = points.len() - 1;
        let points: Vec<_> = points
            .into_iter()
            .enumerate()
            .map(|(i, (x, value))| ControlPoint {
                id: i as PointId,
                x: match i {
                    0 => 0.0,
                    i if i == last => 1.0,
                    _ => x.clamp(0.0, 1.0),
                },
                value,
            })
            .collect();

        Ok(Self {
            next_id: points.len() as PointId,
            points,
            selected: None,
            revision: 0,
        })
    }

    #[must_use]
    pub fn points(&self) -> &[ControlPoint<V>] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: a curve keeps its two endpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Counter bumped on every successful edit.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn is_endpoint(&self, index: usize) -> bool {
        index == 0 || index + 1 == self.points.len()
    }

    /// Index of the point with the given identity.
    #[must_use]
    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    /// Marks the point at `index` as the one being edited.
    pub fn select(&mut self, index: usize) -> bool {
        match self.points.get(index) {
            Some(p) => {
                self.selected = Some(p.id);
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Current index of the selected point, re-resolved by identity.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|id| self.index_of(id))
    }

    /// Inserts a new interior point.
    ///
    /// Refused while a point is selected. Returns the new point's identity.
    pub fn add_point(&mut self, x: f32, value: V) -> Option<PointId> {
        if self.selected.is_some() || !x.is_finite() {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.insert_sorted(ControlPoint {
            id,
            x: x.clamp(0.0, 1.0),
            value,
        });
        self.revision += 1;
        Some(id)
    }

    /// Moves the point at `index` and updates its value.
    ///
    /// Endpoints keep their `x`. Returns the point's index after re-sorting.
    pub fn move_point(&mut self, index: usize, new_x: f32, new_value: V) -> Option<usize> {
        if index >= self.points.len() {
            return None;
        }
        if self.is_endpoint(index) {
            self.points[index].value = new_value;
            self.revision += 1;
            return Some(index);
        }

        let mut point = self.points.remove(index);
        if new_x.is_finite() {
            point.x = new_x.clamp(0.0, 1.0);
        }
        point.value = new_value;
        let new_index = self.insert_sorted(point);
        self.revision += 1;
        Some(new_index)
    }

    /// Replaces the value of the point at `index`, keeping its position.
    pub fn set_value(&mut self, index: usize, value: V) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                p.value = value;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    /// Removes an interior point. Endpoints are never removed.
    pub fn remove_point(&mut self, index: usize) -> bool {
        if index >= self.points.len() || self.is_endpoint(index) || self.points.len() <= 2 {
            return false;
        }
        let removed = self.points.remove(index);
        if self.selected == Some(removed.id) {
            self.selected = None;
        }
        self.revision += 1;
        true
    }

    /// Inserts after every point with an equal or smaller `x`, but always
    /// between the two endpoints.
    fn insert_sorted(&mut self, point: ControlPoint<V>) -> usize {
        let index = self
            .points
            .partition_point(|p| p.x <= point.x)
            .clamp(1, self.points.len() - 1);
        self.points.insert(index, point);
        index
    }

    /// Writes the piecewise-linear interpolation of this curve into `out`.
    ///
    /// Segments whose endpoints round to the same bucket are skipped. A
    /// bucket shared by two segments takes the later segment's value, and
    /// the first and last buckets always hold the endpoint values.
    pub fn rasterize(&self, out: &mut [V]) {
        let n = out.len();
        if n == 0 {
            return;
        }
        for pair in self.points.windows(2) {
            let (p1, p2) = (&pair[0], &pair[1]);
            let a = bucket(p1.x, n);
            let b = bucket(p2.x, n);
            if b <= a {
                continue;
            }
            let span = (b - a) as f32;
            for (j, slot) in out.iter_mut().enumerate().take(b + 1).skip(a) {
                *slot = V::mix(p1.value, p2.value, (j - a) as f32 / span);
            }
        }
        if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            out[0] = first.value;
            out[n - 1] = last.value;
        }
    }
}

/// Dense RGBA classification table.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    entries: Vec<Vec4>,
}

impl LookupTable {
    /// Combines rasterized color and opacity channels.
    #[must_use]
    pub fn from_channels(color: &[Vec3], opacity: &[f32]) -> Self {
        Self {
            entries: color
                .iter()
                .zip(opacity)
                .map(|(c, &a)| c.extend(a))
                .collect(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[Vec4] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Linearly filtered lookup of a normalized intensity.
    #[must_use]
    pub fn sample(&self, intensity: f32) -> Vec4 {
        let Some(last) = self.entries.len().checked_sub(1) else {
            return Vec4::ZERO;
        };
        let pos = intensity.clamp(0.0, 1.0) * last as f32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let i = (pos.floor() as usize).min(last);
        let j = (i + 1).min(last);
        let t = pos - i as f32;
        self.entries[i] * (1.0 - t) + self.entries[j] * t
    }
}

/// Color and opacity curves plus the lookup table derived from them.
///
/// Every edit that changes a curve rebuilds the table and queues a copy for
/// the renderer, which picks it up with [`TransferFunction::take_published`].
#[derive(Debug, Clone)]
pub struct TransferFunction {
    color: Curve<Vec3>,
    opacity: Curve<f32>,
    lut: LookupTable,
    seen: (u64, u64),
    published: Option<LookupTable>,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self::from_preset(&Preset::default())
    }
}

impl TransferFunction {
    #[must_use]
    pub fn new(color: Curve<Vec3>, opacity: Curve<f32>) -> Self {
        let lut = Self::build(&color, &opacity);
        Self {
            seen: (color.revision(), opacity.revision()),
            color,
            opacity,
            published: Some(lut.clone()),
            lut,
        }
    }

    #[must_use]
    pub fn from_preset(preset: &Preset) -> Self {
        Self::new(preset.color.clone(), preset.opacity.clone())
    }

    #[must_use]
    pub fn color(&self) -> &Curve<Vec3> {
        &self.color
    }

    #[must_use]
    pub fn opacity(&self) -> &Curve<f32> {
        &self.opacity
    }

    #[must_use]
    pub fn lut(&self) -> &LookupTable {
        &self.lut
    }

    /// Edits the color curve, rebuilding and publishing if it changed.
    pub fn edit_color<R>(&mut self, edit: impl FnOnce(&mut Curve<Vec3>) -> R) -> R {
        let result = edit(&mut self.color);
        self.sync();
        result
    }

    /// Edits the opacity curve, rebuilding and publishing if it changed.
    pub fn edit_opacity<R>(&mut self, edit: impl FnOnce(&mut Curve<f32>) -> R) -> R {
        let result = edit(&mut self.opacity);
        self.sync();
        result
    }

    /// Replaces both curves with the preset's.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.color = preset.color.clone();
        self.opacity = preset.opacity.clone();
        self.rebuild();
    }

    /// Recomputes the lookup table and publishes it.
    pub fn rebuild(&mut self) {
        self.lut = Self::build(&self.color, &self.opacity);
        self.seen = (self.color.revision(), self.opacity.revision());
        self.published = Some(self.lut.clone());
        log::debug!("rebuilt transfer function lookup table");
    }

    /// Takes the most recent unconsumed snapshot. Older ones are superseded.
    pub fn take_published(&mut self) -> Option<LookupTable> {
        self.published.take()
    }

    fn sync(&mut self) {
        if self.seen != (self.color.revision(), self.opacity.revision()) {
            self.rebuild();
        }
    }

    fn build(color: &Curve<Vec3>, opacity: &Curve<f32>) -> LookupTable {
        let mut rgb = vec![Vec3::ZERO; LUT_SIZE];
        let mut alpha = vec![0.0; LUT_SIZE];
        color.rasterize(&mut rgb);
        opacity.rasterize(&mut alpha);
        LookupTable::from_channels(&rgb, &alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn xs<V: CurveValue>(curve: &Curve<V>) -> Vec<f32> {
        curve.points().iter().map(|p| p.x).collect()
    }

    fn assert_invariants<V: CurveValue>(curve: &Curve<V>) {
        let points = curve.points();
        assert!(points.len() >= 2);
        assert_eq!(points[0].x, 0.0);
        assert_eq!(points[points.len() - 1].x, 1.0);
        assert!(points.windows(2).all(|w| w[0].x <= w[1].x));
    }

    #[test]
    fn test_new_curve_has_endpoints() {
        let curve = Curve::new(0.0f32, 1.0);
        assert_eq!(xs(&curve), vec![0.0, 1.0]);
        assert!(!curve.is_empty());
    }

    #[test]
    fn test_add_point_sorts() {
        let mut curve = Curve::new(0.0f32, 1.0);
        curve.add_point(0.7, 0.2).unwrap();
        curve.add_point(0.3, 0.9).unwrap();
        assert_eq!(xs(&curve), vec![0.0, 0.3, 0.7, 1.0]);
        assert_eq!(curve.revision(), 2);
    }

    #[test]
    fn test_add_point_refused_while_selected() {
        let mut curve = Curve::new(0.0f32, 1.0);
        curve.select(0);
        assert!(curve.add_point(0.5, 0.5).is_none());
        assert_eq!(curve.len(), 2);

        curve.clear_selection();
        assert!(curve.add_point(0.5, 0.5).is_some());
    }

    #[test]
    fn test_add_point_at_bounds_stays_interior() {
        let mut curve = Curve::new(0.0f32, 1.0);
        curve.add_point(1.5, 0.3).unwrap();
        curve.add_point(-2.0, 0.4).unwrap();
        assert_eq!(xs(&curve), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(curve.points()[0].value, 0.0);
        assert_eq!(curve.points()[3].value, 1.0);
        assert_invariants(&curve);
    }

    #[test]
    fn test_endpoint_x_is_pinned() {
        let mut curve = Curve::new(0.0f32, 1.0);
        assert_eq!(curve.move_point(0, 0.5, 0.25), Some(0));
        assert_eq!(curve.points()[0].x, 0.0);
        assert_eq!(curve.points()[0].value, 0.25);

        assert_eq!(curve.move_point(1, 0.2, 0.75), Some(1));
        assert_eq!(curve.points()[1].x, 1.0);
        assert_eq!(curve.points()[1].value, 0.75);
    }

    #[test]
    fn test_move_point_resorts_and_selection_follows() {
        let mut curve = Curve::new(0.0f32, 1.0);
        let a = curve.add_point(0.2, 0.1).unwrap();
        curve.add_point(0.6, 0.2).unwrap();
        curve.select(curve.index_of(a).unwrap());
        assert_eq!(curve.selected_index(), Some(1));

        let new_index = curve.move_point(1, 0.8, 0.5).unwrap();
        assert_eq!(new_index, 2);
        assert_eq!(curve.selected_index(), Some(2));
        assert_eq!(xs(&curve), vec![0.0, 0.6, 0.8, 1.0]);
    }

    #[test]
    fn test_remove_point_rules() {
        let mut curve = Curve::new(0.0f32, 1.0);
        assert!(!curve.remove_point(0));
        assert!(!curve.remove_point(1));
        assert!(!curve.remove_point(5));

        curve.add_point(0.5, 0.5).unwrap();
        curve.select(1);
        assert!(curve.remove_point(1));
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.selected_index(), None);
    }

    #[test]
    fn test_from_points_sorts_and_pins() {
        let curve = Curve::from_points([(0.9, 1.0f32), (0.05, 0.0), (0.5, 0.5)]).unwrap();
        assert_eq!(xs(&curve), vec![0.0, 0.5, 1.0]);
        assert!(Curve::from_points([(0.0, 1.0f32)]).is_err());
        assert!(Curve::from_points([(0.0, 1.0f32), (f32::NAN, 0.0)]).is_err());
    }

    #[test]
    fn test_zero_width_segment_is_skipped() {
        let curve =
            Curve::from_points([(0.0, 0.0f32), (0.5, 0.2), (0.5, 0.8), (1.0, 1.0)]).unwrap();
        let mut out = vec![f32::NAN; LUT_SIZE];
        curve.rasterize(&mut out);
        assert!(out.iter().all(|v| v.is_finite()));
        // The later segment owns the shared bucket
        assert_eq!(out[bucket(0.5, LUT_SIZE)], 0.8);
    }

    #[test]
    fn test_rasterize_linear_ramp() {
        let curve = Curve::new(0.0f32, 1.0);
        let mut out = vec![0.0; LUT_SIZE];
        curve.rasterize(&mut out);
        for (i, v) in out.iter().enumerate() {
            assert!((v - i as f32 / (LUT_SIZE - 1) as f32).abs() < 1e-5);
        }
    }

    #[test]
    fn test_default_preset_lut() {
        let tf = TransferFunction::default();
        let lut = tf.lut();
        assert_eq!(lut.len(), LUT_SIZE);

        let last = (LUT_SIZE - 1) as f32;
        let low = (0.4 * last) as usize;
        let high = (0.401 * last).ceil() as usize;
        for (i, entry) in lut.entries().iter().enumerate() {
            if i < low {
                assert!((entry.w - 1.0).abs() < 1e-6, "bucket {i} should be opaque");
            } else if i > high {
                assert!(entry.w.abs() < 1e-6, "bucket {i} should be transparent");
            }
        }
        assert_eq!(lut.entries()[0], Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(lut.entries()[LUT_SIZE - 1], Vec4::new(1.0, 1.0, 1.0, 0.0));
    }

    #[test]
    fn test_edits_publish_snapshots() {
        let mut tf = TransferFunction::default();
        assert!(tf.take_published().is_some());
        assert!(tf.take_published().is_none());

        // Selection alone is not an edit
        tf.edit_opacity(|c| c.select(1));
        assert!(tf.take_published().is_none());
        tf.edit_opacity(Curve::clear_selection);

        tf.edit_color(|c| c.add_point(0.5, Vec3::new(1.0, 0.0, 0.0)));
        let snapshot = tf.take_published().unwrap();
        assert_eq!(&snapshot, tf.lut());
        assert_eq!(snapshot.entries()[bucket(0.5, LUT_SIZE)].x, 1.0);

        // Refused edits publish nothing
        tf.edit_opacity(|c| c.remove_point(0));
        assert!(tf.take_published().is_none());
    }

    #[test]
    fn test_lut_sample_hits_buckets() {
        let tf = TransferFunction::default();
        let lut = tf.lut();
        assert_eq!(lut.sample(0.0), lut.entries()[0]);
        assert_eq!(lut.sample(1.0), lut.entries()[LUT_SIZE - 1]);
    }

    #[test]
    fn test_empty_lut_samples_transparent() {
        let lut = LookupTable::from_channels(&[], &[]);
        assert!(lut.is_empty());
        assert_eq!(lut.sample(0.5), Vec4::ZERO);

        let single = LookupTable::from_channels(&[Vec3::ONE], &[0.5]);
        assert_eq!(single.sample(0.7), Vec4::new(1.0, 1.0, 1.0, 0.5));
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Add(f32, f32),
        Move(usize, f32, f32),
        Remove(usize),
        Select(usize),
        Clear,
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(x, v)| Edit::Add(x, v)),
            (0usize..8, -0.5f32..1.5, 0.0f32..=1.0).prop_map(|(i, x, v)| Edit::Move(i, x, v)),
            (0usize..8).prop_map(Edit::Remove),
            (0usize..8).prop_map(Edit::Select),
            Just(Edit::Clear),
        ]
    }

    proptest! {
        #[test]
        fn prop_edits_keep_curve_invariants(edits in prop::collection::vec(edit_strategy(), 0..40)) {
            let mut curve = Curve::new(0.0f32, 1.0);
            for edit in edits {
                match edit {
                    Edit::Add(x, v) => { curve.add_point(x, v); }
                    Edit::Move(i, x, v) => { curve.move_point(i, x, v); }
                    Edit::Remove(i) => { curve.remove_point(i); }
                    Edit::Select(i) => { curve.select(i); }
                    Edit::Clear => curve.clear_selection(),
                }
                assert_invariants(&curve);
            }
        }

        #[test]
        fn prop_lut_matches_control_points(
            interior in prop::collection::btree_set(1usize..LUT_SIZE - 1, 0..6),
            values in prop::collection::vec((0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0), 8),
        ) {
            let last = (LUT_SIZE - 1) as f32;
            let mut xs = vec![0.0];
            xs.extend(interior.iter().map(|&i| i as f32 / last));
            xs.push(1.0);

            let color = Curve::from_points(
                xs.iter().zip(&values).map(|(&x, v)| (x, Vec3::new(v.0, v.1, v.2))),
            ).unwrap();
            let opacity = Curve::from_points(xs.iter().zip(&values).map(|(&x, v)| (x, v.3))).unwrap();
            let tf = TransferFunction::new(color.clone(), opacity.clone());
            let lut = tf.lut();

            prop_assert_eq!(lut.len(), LUT_SIZE);
            prop_assert_eq!(lut.entries()[0].truncate(), color.points()[0].value);
            prop_assert_eq!(lut.entries()[0].w, opacity.points()[0].value);
            prop_assert_eq!(lut.entries()[LUT_SIZE - 1].w, opacity.points().last().unwrap().value);

            for (c, a) in color.points().iter().zip(opacity.points()) {
                let entry = lut.entries()[bucket(c.x, LUT_SIZE)];
                prop_assert!((entry.truncate() - c.value).abs().max_element() < 1e-5);
                prop_assert!((entry.w - a.value).abs() < 1e-5);
            }
        }

        #[test]
        fn prop_add_then_remove_restores_lut(x in 0.0f32..=1.0, v in 0.0f32..=1.0) {
            let mut tf = TransferFunction::default();
            let before = tf.lut().clone();
            let id = tf.edit_opacity(|c| c.add_point(x, v)).unwrap();
            let index = tf.opacity().index_of(id).unwrap();
            prop_assert!(tf.edit_opacity(|c| c.remove_point(index)));
            prop_assert_eq!(tf.lut(), &before);
        }
    }
}
