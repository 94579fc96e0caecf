use std::cell::Cell;
use std::rc::Rc;

use vs_drawing::{HandleDirection, HistoryEventKind};
use vs_settings::HandleMode;
use vstage::{
    Color, ConfigManager, Element, ElementFactory, ElementId, ElementStyle, LayerKind, Point,
    Settings, Stage,
};

fn stage() -> Stage {
    Stage::open(Settings::default(), 160, 120).unwrap()
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Element {
    ElementFactory::create(
        "rectangle",
        vec![Point::new(x0, y0), Point::new(x1, y1)],
        ElementStyle::filled(Color::rgb(0.0, 0.5, 0.0)),
    )
    .unwrap()
}

fn three(stage: &mut Stage) -> [ElementId; 3] {
    [
        stage.add_element(rect(0.0, 0.0, 10.0, 10.0)).unwrap(),
        stage.add_element(rect(20.0, 0.0, 30.0, 10.0)).unwrap(),
        stage.add_element(rect(40.0, 0.0, 50.0, 10.0)).unwrap(),
    ]
}

#[test]
fn rectangle_transform_moves_corners() {
    let mut s = stage();
    let id = s.add_element(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    s.transform_elements(&[id], Point::new(5.0, 0.0)).unwrap();

    let model = s.element(id).unwrap().model();
    assert_eq!(model.points, vec![Point::new(5.0, 0.0), Point::new(15.0, 10.0)]);
    assert_eq!((model.width, model.height), (10.0, 10.0));
}

#[test]
fn transform_and_inverse_restore_geometry() {
    let mut s = stage();
    let id = s.add_element(rect(3.0, 4.0, 17.0, 9.0)).unwrap();
    let before = s.element(id).unwrap().path_points().to_vec();

    let delta = Point::new(7.25, -3.5);
    s.transform_elements(&[id], delta).unwrap();
    s.transform_elements(&[id], -delta).unwrap();

    for (a, b) in before.iter().zip(s.element(id).unwrap().path_points()) {
        assert!(a.approx_eq(*b, 1e-9));
    }
}

#[test]
fn delete_undo_redo_scenario() {
    let mut s = stage();
    let [a, b, c] = three(&mut s);
    let b_model = s.element(b).unwrap().model().clone();

    s.remove_elements(&[b]).unwrap();
    assert_eq!(s.element_ids(), vec![a, c]);

    assert!(s.undo().unwrap());
    assert_eq!(s.element_ids(), vec![a, b, c]);
    assert_eq!(s.element(b).unwrap().model(), &b_model);

    assert!(s.redo().unwrap());
    assert_eq!(s.element_ids(), vec![a, c]);
}

#[test]
fn undoing_everything_restores_empty_stage() {
    let mut s = stage();
    let [a, b, _] = three(&mut s);
    s.transform_elements(&[a], Point::new(1.0, 1.0)).unwrap();
    s.reorder_element(b, 0).unwrap();
    s.remove_elements(&[a]).unwrap();

    while s.can_undo() {
        s.undo().unwrap();
    }
    assert!(s.element_ids().is_empty());
    assert_eq!(s.history().redo_count(), 6);
}

#[test]
fn new_command_discards_redo_branch() {
    let mut s = stage();
    let a = s.add_element(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    s.undo().unwrap();
    assert!(s.can_redo());

    s.add_element(rect(5.0, 5.0, 15.0, 15.0)).unwrap();
    assert!(!s.can_redo());
    assert!(!s.redo().unwrap());
    assert!(s.element(a).is_none());
}

#[test]
fn keys_stay_unique_through_edits() {
    let mut s = stage();
    let [a, b, c] = three(&mut s);
    s.reorder_element(a, 2).unwrap();
    s.remove_elements(&[b]).unwrap();
    s.undo().unwrap();
    s.reorder_element(c, 0).unwrap();
    s.undo().unwrap();
    s.redo().unwrap();

    let ids = s.element_ids();
    assert_eq!(ids.len(), 3);
    for id in [a, b, c] {
        assert_eq!(ids.iter().filter(|k| **k == id).count(), 1);
        assert!(s.element(id).is_some());
    }
}

#[test]
fn multi_delete_is_one_history_step() {
    let mut s = stage();
    let [a, _, c] = three(&mut s);
    let events = Rc::new(Cell::new(0));
    let seen = Rc::clone(&events);
    s.history_mut().subscribe(move |event| {
        if event.kind == HistoryEventKind::Added {
            seen.set(seen.get() + 1);
        }
    });

    assert_eq!(s.remove_elements(&[a, c]).unwrap(), 2);
    assert_eq!(events.get(), 1);
    s.undo().unwrap();
    assert_eq!(s.element_ids().len(), 3);
}

#[test]
fn rotation_angle_includes_configured_offset() {
    let settings = Settings {
        rotation_offset_deg: 30.0,
        ..Settings::default()
    };
    let mut s = Stage::open(settings, 100, 100).unwrap();
    let id = s.add_element(rect(10.0, 10.0, 30.0, 30.0)).unwrap();
    s.select(id).unwrap();

    let mask = *s.mask().unwrap();
    let angle = s
        .transformers()
        .rotation_angle(&mask, Point::new(mask.center.x + 10.0, mask.center.y))
        .unwrap();
    assert!((angle - 30.0).abs() < 1e-9);
}

#[test]
fn rotate_by_pointer_sweep() {
    let mut s = stage();
    let id = s.add_element(rect(40.0, 40.0, 60.0, 60.0)).unwrap();
    s.select(id).unwrap();

    let center = Point::new(50.0, 50.0);
    let moved = s
        .rotate_selection_by_pointer(center + Point::new(0.0, -20.0), center + Point::new(20.0, 0.0))
        .unwrap();
    assert!(moved);
    assert!((s.element(id).unwrap().rotation() - 90.0).abs() < 1e-9);
}

#[test]
fn corner_resize_keeps_opposite_corner() {
    let mut s = stage();
    let id = s.add_element(rect(10.0, 10.0, 30.0, 30.0)).unwrap();
    s.select(id).unwrap();
    s.resize_selection(HandleDirection::TopLeft, Point::new(0.0, 5.0))
        .unwrap();

    let bounds = s.element(id).unwrap().bounds();
    assert!((bounds.x - 0.0).abs() < 1e-9 && (bounds.y - 5.0).abs() < 1e-9);
    assert!((bounds.right() - 30.0).abs() < 1e-9 && (bounds.bottom() - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_image_does_not_blank_the_layer() {
    let mut s = stage();
    s.add_element(rect(0.0, 0.0, 20.0, 20.0)).unwrap();
    let picture = ElementFactory::image(
        [Point::new(40.0, 0.0), Point::new(80.0, 40.0)],
        "/nonexistent/picture.png",
        ElementStyle::default(),
    )
    .unwrap();
    s.add_element(picture).unwrap();

    let frame = s.render_frame().await;
    let content = frame.report(LayerKind::Content).unwrap();
    assert_eq!(content.failed, 1);
    assert_eq!(content.executed, 2);
    assert_eq!(s.surface(LayerKind::Content).unwrap().pixel(10, 10).map(|p| p[3]), Some(255));
}

#[test]
fn settings_file_drives_stage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vstage.json");
    std::fs::write(
        &path,
        r#"{ "handle_mode": "corners", "rotation_enabled": false, "history_limit": 2 }"#,
    )
    .unwrap();

    let config = ConfigManager::load(&path).unwrap();
    let mut s = vstage::open_stage(&config, 64, 64).unwrap();
    assert_eq!(s.transformers().handles().len(), 4);

    for i in 0..4 {
        let x = f64::from(i) * 10.0;
        s.add_element(rect(x, 0.0, x + 5.0, 5.0)).unwrap();
    }
    assert_eq!(s.history().undo_count(), 2);
}

#[test]
fn settings_round_trip_through_manager() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("vstage.json");

    let config = ConfigManager::load(&path).unwrap();
    config.update(|s| s.handle_mode = HandleMode::None);
    config.save().unwrap();

    let reloaded = ConfigManager::load(&path).unwrap();
    assert_eq!(reloaded.get().handle_mode, HandleMode::None);
}

#[tokio::test]
async fn export_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");

    let mut s = stage();
    let id = s.add_element(rect(10.0, 10.0, 50.0, 50.0)).unwrap();
    s.select(id).unwrap();
    let frame = vstage::export_png(&mut s, &path).await.unwrap();

    assert_eq!(frame.failed(), 0);
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}
