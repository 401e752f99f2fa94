//! End-to-end screening: list file, roster file, background run, report

use screening_core::{
    spawn_screening, LocalListSource, ListSource, RawReferenceList, ReferenceListIngestor,
    RosterImporter, RunState, ScreeningEvent, ScreeningPipeline, ScreeningReport,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const LIST: &str = "\
fileGenerationDate;Entity_LogicalId;Entity_SubjectType;NameAlias_LastName;NameAlias_FirstName;NameAlias_MiddleName;NameAlias_WholeName
2024-05-02;101;P;Petrović;Ivan;;Ivan Petrović
2024-05-02;101;P;;;;Ivan Petrovic
2024-05-02;202;E;;;;Petrovic Trading Ltd
2024-05-02;303;P;Иванов;Иван;;Иван Иванов
2024-05-02;404;P;Horvat;Ana;Marija;Ana Marija Horvat
2024-05-02;404;P;Horvat;Ana;Marija;Ana Marija Horvat
";

const ROSTER: &str = "\
IME,OIB,ADRESA
Petrov Ivan,12345678901,Ilica 1
Marić Marko,23456789012,Split
Horvat Ana,34567890123,Osijek
Kovač Petra,45678901234,Rijeka
";

fn write_inputs(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let list = dir.join("list.csv");
    let roster = dir.join("clients.csv");
    std::fs::write(&list, LIST).unwrap();
    std::fs::write(&roster, ROSTER).unwrap();
    (list, roster)
}

#[test]
fn test_index_filters_rows() {
    let raw = RawReferenceList::from_reader(LIST.as_bytes(), b';').unwrap();
    let index = ReferenceListIngestor::default().build_index(&raw).unwrap();

    let stats = index.stats();
    assert_eq!(stats.rows_read, 6);
    assert_eq!(stats.person_rows, 5);
    assert_eq!(stats.rejected_script, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(index.len(), 3);
    assert_eq!(index.entity_count(), 2);
    assert!(index.aliases().all(|a| a.entity_id != "202"));
    assert_eq!(index.metadata().file_generation_date.as_deref(), Some("2024-05-02"));
}

#[tokio::test]
async fn test_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let (list_path, roster_path) = write_inputs(dir.path());

    let list = LocalListSource::new(&list_path).fetch().await.unwrap();
    let index = ReferenceListIngestor::default().load(&list.path).unwrap();
    let metadata = index.metadata().clone();
    let import = RosterImporter::default().load(&roster_path).unwrap();
    assert_eq!(import.summary(), "Loaded 4 people.");

    let roster: Arc<[_]> = import.entries.into();
    let mut handle = spawn_screening(
        Arc::new(ScreeningPipeline::default()),
        roster.clone(),
        Ok(Arc::new(index)),
        CancellationToken::new(),
    );

    let mut progress = Vec::new();
    let mut matched_positions = Vec::new();
    let mut completions = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            ScreeningEvent::Progress { current, total } => progress.push((current, total)),
            ScreeningEvent::Match { outcome, .. } => matched_positions.push(outcome.position),
            ScreeningEvent::Completed { matched, total } => completions.push((matched, total)),
        }
    }

    assert_eq!(progress, vec![(0, 4), (1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(matched_positions, vec![0, 2]);
    assert_eq!(completions, vec![(2, 4)]);
    assert_eq!(handle.state(), RunState::Completed);

    let summary = handle.join().await.unwrap();
    let mut entries = roster.to_vec();
    for outcome in &summary.outcomes {
        entries[outcome.position].apply_outcome(outcome);
    }

    assert_eq!(entries[0].match_count, 1);
    assert_eq!(
        entries[0].matching_names,
        vec!["Ivan Petrović".to_string(), "Ivan Petrovic".to_string()]
    );
    assert_eq!(entries[1].match_count, 0);
    assert_eq!(entries[2].matching_names, vec!["Ana Marija Horvat".to_string()]);

    let report_path = dir.path().join("report.json");
    let report = ScreeningReport::build(&entries, &summary, &metadata);
    report.write_json(&report_path).unwrap();

    assert_eq!(report.total_matched, 2);
    assert_eq!(report.matches[0].name, "Petrov Ivan");
    assert_eq!(report.matches[1].identifier, "34567890123");
    assert!(report_path.exists());
}

#[tokio::test]
async fn test_cancelled_run() {
    let dir = tempfile::tempdir().unwrap();
    let (list_path, roster_path) = write_inputs(dir.path());

    let index = ReferenceListIngestor::default().load(&list_path).unwrap();
    let roster: Arc<[_]> = RosterImporter::default().load(&roster_path).unwrap().entries.into();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut handle = spawn_screening(Arc::new(ScreeningPipeline::default()), roster, Ok(Arc::new(index)), cancel);

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }

    assert_eq!(events, vec![ScreeningEvent::Completed { matched: 0, total: 4 }]);
    assert_eq!(handle.state(), RunState::Cancelled);

    let summary = handle.join().await.unwrap();
    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn test_list_without_persons() {
    let raw = RawReferenceList::from_reader(
        "Entity_LogicalId;Entity_SubjectType;NameAlias_WholeName\n202;E;Petrovic Trading Ltd\n".as_bytes(),
        b';',
    )
    .unwrap();
    let index = ReferenceListIngestor::default().build_index(&raw).map(Arc::new);
    assert!(index.is_err());

    let roster: Arc<[_]> = RosterImporter::default().load_csv(ROSTER.as_bytes()).unwrap().entries.into();
    let mut handle = spawn_screening(Arc::new(ScreeningPipeline::default()), roster, index, CancellationToken::new());

    assert_eq!(
        handle.next_event().await,
        Some(ScreeningEvent::Completed { matched: 0, total: 0 })
    );
    assert_eq!(handle.next_event().await, None);

    let summary = handle.join().await.unwrap();
    assert!(summary.index_error.is_some());
}
