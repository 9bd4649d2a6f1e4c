use tracing::debug;

use crate::enums::BlendMode;
use crate::registry::{ViewportHandle, ViewportRegistry};

/// Set a planar viewport's slab thickness as given. Returns false for
/// volumetric viewports, which have no slab.
pub fn set_slab_thickness(handle: &mut ViewportHandle, thickness: f64) -> bool {
    let Some(state) = handle.planar_mut() else {
        return false;
    };
    state.slab_thickness = thickness;
    handle.surface_mut().set_slab_thickness(thickness);
    true
}

/// Change a planar viewport's slab thickness by `delta`, never going below
/// `floor`. Returns the new thickness.
pub fn change_slab_thickness(handle: &mut ViewportHandle, delta: f64, floor: f64) -> Option<f64> {
    let current = handle.planar()?.slab_thickness;
    let thickness = (current + delta).max(floor);
    set_slab_thickness(handle, thickness);
    Some(thickness)
}

/// Switch every viewport's blend mode and redraw. Planar viewports re-apply
/// their slab thickness since a blend mode change may reset it.
pub fn set_blend_mode(registry: &mut ViewportRegistry, mode: BlendMode) {
    debug!(%mode, "Setting blend mode");
    for handle in registry.iter_mut() {
        handle.surface_mut().set_blend_mode(mode);
        if let Some(thickness) = handle.planar().map(|state| state.slab_thickness) {
            handle.surface_mut().set_slab_thickness(thickness);
        }
        handle.surface_mut().render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TransitionRequest;
    use crate::test_utils::mpr_fixture;

    #[test]
    fn relative_changes_stop_at_the_floor() {
        let mut fixture = mpr_fixture();
        let registry = fixture.coordinator.registry_mut();
        let handle = registry.get_mut(0).unwrap();
        assert!(set_slab_thickness(handle, 5.0));

        for _ in 0..40 {
            let thickness = change_slab_thickness(handle, -3.0, 0.1).unwrap();
            assert!(thickness >= 0.1);
        }
        assert_eq!(handle.planar().unwrap().slab_thickness, 0.1);
    }

    #[test]
    fn absolute_thickness_is_not_clamped() {
        let mut fixture = mpr_fixture();
        let handle = fixture.coordinator.registry_mut().get_mut(1).unwrap();
        assert!(set_slab_thickness(handle, 0.01));
        assert_eq!(handle.planar().unwrap().slab_thickness, 0.01);
    }

    #[test]
    fn volumetric_viewports_have_no_slab() {
        let mut fixture = mpr_fixture();
        fixture.transition(TransitionRequest::AppendVolumetric);
        let handle = fixture.coordinator.registry_mut().get_mut(3).unwrap();
        assert!(!set_slab_thickness(handle, 2.0));
        assert_eq!(change_slab_thickness(handle, 1.0, 0.1), None);
    }

    #[test]
    fn blend_mode_reapplies_planar_slabs() {
        let mut fixture = mpr_fixture();
        fixture.transition(TransitionRequest::AppendVolumetric);
        set_blend_mode(fixture.coordinator.registry_mut(), BlendMode::MaximumIntensity);

        let backend = fixture.coordinator.backend();
        for handle in fixture.coordinator.registry().iter() {
            let record = backend.surface(handle.uid()).unwrap();
            assert_eq!(record.blend_mode, BlendMode::MaximumIntensity);
            assert_eq!(record.renders, 1);
            let expected_slab_updates = if handle.is_planar() { 1 } else { 0 };
            assert_eq!(record.slab_updates, expected_slab_updates);
        }
    }
}
