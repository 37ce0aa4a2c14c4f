//! Parameter introspection and control-surface tests
//!
//! Metadata comes back verbatim from the declaration; values speak
//! normalized [0, 1] ratios; out-of-range access is neutral on the hot path
//! and `None` on the metadata path, on both backends.

use soliton::{Backend, ParamKind, ProgramHost};

const PROGRAM: &str = r#"
~freq: slider "Freq" 440 20 2000
~depth: vslider "Depth" 0.2 0.0 1.0
~steps: nentry "Steps" 4 1 16
~trig: button "Trig"
~mute: checkbox "Mute"
out: sin ~freq >> mul ~depth >> meter "Level" 0 1
"#;

fn host_with(backend: Backend) -> ProgramHost {
    let mut host = ProgramHost::new(backend, 48000);
    host.compile(PROGRAM).unwrap();
    host
}

#[test]
fn test_kind_mapping_collapses_widget_taxonomy() {
    for backend in [Backend::Compiled, Backend::Interpreted] {
        let host = host_with(backend);
        let kinds: Vec<ParamKind> = (0..host.param_count())
            .map(|i| host.param(i).unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ParamKind::Slider,
                ParamKind::Slider,
                ParamKind::Slider,
                ParamKind::Button,
                ParamKind::CheckButton,
                ParamKind::Unavailable,
            ]
        );
    }
}

#[test]
fn test_metadata_is_verbatim_from_declaration() {
    let host = host_with(Backend::Compiled);
    let freq = host.param(0).unwrap();
    assert_eq!(freq.label, "Freq");
    assert_eq!(freq.min, 20.0);
    assert_eq!(freq.max, 2000.0);
    assert_eq!(freq.init, 440.0);

    let trig = host.param(3).unwrap();
    assert_eq!(trig.label, "Trig");
    assert_eq!(trig.min, 0.0);
    assert_eq!(trig.max, 1.0);
}

#[test]
fn test_set_then_get_round_trips() {
    for backend in [Backend::Compiled, Backend::Interpreted] {
        let host = host_with(backend);
        // Sliders, buttons, and check-buttons all round-trip ratios
        for index in 0..5 {
            for ratio in [0.0f32, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0] {
                host.set_value(index, ratio);
                assert!(
                    (host.value(index) - ratio).abs() < 1e-5,
                    "param {index} ratio {ratio} came back {}",
                    host.value(index)
                );
            }
        }
    }
}

#[test]
fn test_out_of_domain_ratios_clamp() {
    let host = host_with(Backend::Compiled);
    host.set_value(0, 2.5);
    assert!((host.value(0) - 1.0).abs() < 1e-6);
    host.set_value(0, -2.5);
    assert!(host.value(0).abs() < 1e-6);
}

#[test]
fn test_out_of_range_index_is_neutral_on_both_backends() {
    for backend in [Backend::Compiled, Backend::Interpreted] {
        let host = host_with(backend);
        let beyond = host.param_count() + 3;

        assert!(host.param(beyond).is_none());
        assert_eq!(host.value(beyond), 0.0);
        host.set_value(beyond, 0.9); // silent no-op, never a panic

        // Nothing in range moved
        let expected = (440.0 - 20.0) / (2000.0 - 20.0);
        assert!((f64::from(host.value(0)) - expected).abs() < 1e-6);
    }
}

#[test]
fn test_meter_is_display_only() {
    let mut host = ProgramHost::new(Backend::Interpreted, 48000);
    host.compile("~gain: slider \"Gain\" 1.0 0.0 1.0\nout: 1 >> mul ~gain >> meter \"Level\" 0 1")
        .unwrap();
    assert_eq!(host.param(1).unwrap().kind, ParamKind::Unavailable);

    // Host writes to a meter are ignored...
    host.set_value(1, 0.9);
    assert_eq!(host.value(1), 0.0);

    // ...but the running program feeds it
    let mut out = vec![0.0f32; 64];
    let mut outputs: Vec<&mut [f32]> = vec![&mut out];
    host.compute(64, &[], &mut outputs);
    assert!((host.value(1) - 1.0).abs() < 1e-6);

    host.set_value(0, 0.25);
    let mut outputs: Vec<&mut [f32]> = vec![&mut out];
    host.compute(64, &[], &mut outputs);
    assert!((host.value(1) - 0.25).abs() < 1e-6, "meter tracks the signal");
}

#[test]
fn test_live_view_follows_swaps_and_tolerates_staleness() {
    let mut host = ProgramHost::new(Backend::Compiled, 48000);
    host.compile(PROGRAM).unwrap();

    let view = host.live_params();
    assert_eq!(view.param_count(), 6);

    // Writes through the view land in the running program
    view.set_value(0, 1.0);
    assert!((host.value(0) - 1.0).abs() < 1e-6);

    // A snapshot held across a swap stays readable
    let stale = view.load().unwrap();
    host.compile("out: sin 440").unwrap();
    assert_eq!(view.param_count(), 0, "fresh loads see the new program");
    assert!((stale.value(0) - 1.0).abs() < 1e-6, "stale reads stay safe");
    stale.set_value(0, 0.25); // heard by nobody, harmful to nobody
}
