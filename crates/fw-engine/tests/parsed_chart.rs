//! Walks a cursor over charts that came through the text parser.

use fw_engine::ChartCursor;
use fw_formats::parse_chart;
use fw_ir::Note;
use std::sync::Arc;

const ONE_NOTE: &str = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = TS 4\n  0 = B 120000\n}\n[ExpertSingle]\n{\n  192 = N 0 0\n}\n";

#[test]
fn parsed_chart_walks_to_its_single_note() {
    let chart = parse_chart(ONE_NOTE).unwrap();
    let mut cursor = ChartCursor::new(Arc::new(chart), "ExpertSingle").unwrap();
    assert_eq!(cursor.current_bpm(), 120.0);
    assert_eq!(cursor.current_ticks_per_second(), 384.0);

    let pending = cursor.next_event();
    assert_eq!(pending.distance(), 192);
    // tick-0 sync events are applied when the cursor is built
    assert!(pending.tempo().is_none());
    assert!(pending.signature().is_none());
    assert_eq!(pending.notes(), &[Note::new(192, 0, 0)]);

    cursor.advance_tick(192);
    assert_eq!(cursor.tick(), 192);
    let pending = cursor.next_event();
    assert!(pending.is_empty());
    assert_eq!(pending.distance(), 0);
    assert!(cursor.is_exhausted());
}

#[test]
fn parsed_tempo_change_arrives_with_its_tick() {
    let text = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = TS 4\n  0 = B 120000\n  384 = B 60000\n}\n[ExpertSingle]\n{\n  384 = N 1 0\n}\n";
    let chart = parse_chart(text).unwrap();
    let mut cursor = ChartCursor::new(Arc::new(chart), "ExpertSingle").unwrap();

    let pending = cursor.next_event();
    assert_eq!(pending.distance(), 384);
    assert_eq!(pending.tempo().map(|t| t.bpm), Some(60.0));
    assert_eq!(pending.notes().len(), 1);

    cursor.advance_tick(384);
    assert_eq!(cursor.current_ticks_per_second(), 192.0);
}
