use termstore::{Config, Database, DocId, Document, ErrorKind};

fn sentence(words: &[&str]) -> Document {
    let mut doc = Document::new();
    for (pos, word) in words.iter().enumerate() {
        doc.add_posting(word, pos as u32 + 1, 1);
    }
    doc
}

#[test]
fn committed_documents_are_readable() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    let first = writer.add_document(&sentence(&["the", "dog", "chased", "the", "cat"])).unwrap();
    let second = writer.add_document(&sentence(&["a", "dog", "slept"])).unwrap();
    assert_eq!((first, second), (DocId(1), DocId(2)));
    assert_eq!(writer.commit().unwrap(), 1);

    let reader = db.reader();
    assert_eq!(reader.doc_count().unwrap(), 2);
    assert_eq!(reader.total_length().unwrap(), 8);
    assert_eq!(reader.average_length().unwrap(), 4.0);
    assert_eq!(reader.get_term_frequency("dog").unwrap(), 2);
    assert_eq!(reader.get_term_frequency("the").unwrap(), 1);
    assert_eq!(reader.get_collection_frequency("the").unwrap(), 2);
    assert_eq!(reader.get_term_frequency("unicorn").unwrap(), 0);

    let dogs: Vec<_> = reader
        .get_posting_list_iterator("dog")
        .unwrap()
        .map(|p| p.unwrap())
        .map(|p| (p.doc_id, p.wdf, p.doc_length))
        .collect();
    assert_eq!(dogs, vec![(DocId(1), 1, 5), (DocId(2), 1, 3)]);

    assert_eq!(reader.get_position_list(DocId(1), "the").unwrap(), vec![1, 4]);
    assert_eq!(reader.position_count(DocId(1), "the").unwrap(), 2);
    assert_eq!(reader.doc_length(DocId(2)).unwrap(), 3);

    let termlist = reader.termlist(DocId(2)).unwrap();
    assert_eq!(termlist.doc_length, 3);
    assert_eq!(termlist.terms.len(), 3);
}

#[test]
fn documents_can_be_added_under_chosen_ids() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    writer.add_document_with_id(DocId(10), &sentence(&["ten"])).unwrap();
    assert_eq!(writer.last_docid(), DocId(10));
    assert_eq!(writer.add_document(&sentence(&["next"])).unwrap(), DocId(11));

    writer.add_document_with_id(DocId(4), &sentence(&["four"])).unwrap();
    assert_eq!(writer.last_docid(), DocId(11));
    assert_eq!(
        writer.add_document_with_id(DocId(10), &sentence(&["again"])).unwrap_err().kind,
        ErrorKind::InvalidOperation
    );
    assert_eq!(
        writer.add_document_with_id(DocId(0), &sentence(&["zero"])).unwrap_err().kind,
        ErrorKind::InvalidArgument
    );
    writer.commit().unwrap();

    let reader = db.reader();
    assert_eq!(reader.doc_count().unwrap(), 3);
    assert_eq!(reader.last_docid().unwrap(), DocId(11));
    assert_eq!(reader.get_term_frequency("again").unwrap(), 0);
    let ids: Vec<_> = reader
        .all_documents()
        .unwrap()
        .map(|p| p.unwrap().doc_id)
        .collect();
    assert_eq!(ids, vec![DocId(4), DocId(10), DocId(11)]);
}

#[test]
fn posting_iterator_reads_positions() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    let mut doc = Document::new();
    for pos in [3, 9, 12] {
        doc.add_posting("word", pos, 1);
    }
    writer.add_document(&doc).unwrap();
    writer.commit().unwrap();

    let reader = db.reader();
    let mut it = reader.get_posting_list_iterator("word").unwrap();
    assert!(it.advance().unwrap().is_some());
    assert_eq!(it.read_position_list().unwrap(), vec![3, 9, 12]);
}

#[test]
fn document_length_list_has_no_positions() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    writer.add_document(&sentence(&["x", "y"])).unwrap();
    writer.commit().unwrap();

    let reader = db.reader();
    let mut all = reader.all_documents().unwrap();
    let posting = all.advance().unwrap().unwrap();
    assert_eq!((posting.wdf, posting.doc_length), (2, 2));
    assert_eq!(all.read_position_list().unwrap_err().kind, ErrorKind::InvalidOperation);
    assert_eq!(reader.get_term_frequency("").unwrap_err().kind, ErrorKind::InvalidArgument);
}

#[test]
fn readers_keep_their_snapshot() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    writer.add_document(&sentence(&["old"])).unwrap();
    writer.commit().unwrap();

    let before = db.reader();
    writer.add_document(&sentence(&["new"])).unwrap();
    assert_eq!(db.reader().get_term_frequency("new").unwrap(), 0);
    assert_eq!(writer.term_frequency("new").unwrap(), 1);

    writer.commit().unwrap();
    assert_eq!(before.revision(), 1);
    assert_eq!(before.get_term_frequency("new").unwrap(), 0);
    assert_eq!(db.reader().get_term_frequency("new").unwrap(), 1);
    assert_eq!(db.reader_at(1).unwrap().doc_count().unwrap(), 1);
    assert!(matches!(db.reader_at(7), Err(e) if e.kind == ErrorKind::NotFound));
}

#[test]
fn replace_and_delete_update_statistics() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    let did = writer.add_document(&sentence(&["red", "fish"])).unwrap();
    writer.add_document(&sentence(&["blue", "fish"])).unwrap();
    writer.commit().unwrap();

    writer.replace_document(did, &sentence(&["red", "red", "bird"])).unwrap();
    writer.commit().unwrap();
    let reader = db.reader();
    assert_eq!(reader.get_term_frequency("fish").unwrap(), 1);
    assert_eq!(reader.get_collection_frequency("red").unwrap(), 2);
    assert_eq!(reader.doc_length(did).unwrap(), 3);
    assert_eq!(reader.get_position_list(did, "red").unwrap(), vec![1, 2]);
    assert_eq!(reader.get_position_list(did, "fish").unwrap_err().kind, ErrorKind::NotFound);

    writer.delete_document(did).unwrap();
    writer.commit().unwrap();
    let reader = db.reader();
    assert_eq!(reader.get_term_frequency("red").unwrap(), 0);
    assert_eq!(reader.doc_count().unwrap(), 1);
    assert_eq!(reader.doc_length(did).unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(reader.termlist(did).unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(writer.delete_document(did).unwrap_err().kind, ErrorKind::NotFound);
}

#[test]
fn only_one_writer_at_a_time() {
    let db = Database::in_memory().unwrap();
    let writer = db.writer().unwrap();
    assert!(matches!(db.writer(), Err(e) if e.kind == ErrorKind::DatabaseLocked));
    drop(writer);
    assert!(db.writer().is_ok());
}

#[test]
fn cancel_discards_uncommitted_work() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    writer.add_document(&sentence(&["kept"])).unwrap();
    writer.commit().unwrap();

    writer.add_document(&sentence(&["dropped"])).unwrap();
    writer.flush().unwrap();
    writer.cancel().unwrap();
    assert!(!writer.has_pending_changes());
    assert_eq!(writer.last_docid(), DocId(1));
    assert_eq!(writer.term_frequency("dropped").unwrap(), 0);

    assert_eq!(writer.add_document(&sentence(&["again"])).unwrap(), DocId(2));
}

#[test]
fn value_slots_track_streams_and_bounds() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    for price in ["30", "10", "20"] {
        let mut doc = sentence(&["item"]);
        doc.set_value(0, price);
        writer.add_document(&doc).unwrap();
    }
    writer.commit().unwrap();

    let reader = db.reader();
    assert_eq!(reader.get_value(DocId(2), 0).unwrap().as_deref(), Some(&b"10"[..]));
    assert_eq!(reader.get_value(DocId(2), 5).unwrap(), None);
    let stream: Vec<_> = reader.value_stream(0).unwrap().into_iter().map(|(d, _)| d.0).collect();
    assert_eq!(stream, vec![1, 2, 3]);
    let stats = reader.get_value_stats(0).unwrap();
    assert_eq!((stats.freq, stats.lower_bound.as_slice(), stats.upper_bound.as_slice()), (3, &b"10"[..], &b"30"[..]));

    writer.delete_document(DocId(1)).unwrap();
    writer.delete_document(DocId(2)).unwrap();
    writer.delete_document(DocId(3)).unwrap();
    writer.commit().unwrap();
    let reader = db.reader();
    assert!(reader.value_stream(0).unwrap().is_empty());
    assert_eq!(reader.get_value_stats(0).unwrap().freq, 0);
}

#[test]
fn reaching_the_flush_threshold_commits() {
    let config = Config { flush_threshold: 3, ..Config::default() };
    let db = Database::open(config).unwrap();
    let mut writer = db.writer().unwrap();
    for _ in 0..3 {
        writer.add_document(&sentence(&["auto"])).unwrap();
    }
    assert_eq!(db.revision(), 1);
    assert_eq!(db.reader().get_term_frequency("auto").unwrap(), 3);
}

#[test]
fn invalid_documents_are_rejected() {
    let db = Database::in_memory().unwrap();
    let mut writer = db.writer().unwrap();
    let mut doc = Document::new();
    doc.add_term("", 1);
    assert_eq!(writer.add_document(&doc).unwrap_err().kind, ErrorKind::InvalidArgument);
    assert_eq!(
        writer.replace_document(DocId(0), &sentence(&["a"])).unwrap_err().kind,
        ErrorKind::InvalidArgument
    );
}

#[test]
fn committed_revisions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(Config::in_dir(dir.path())).unwrap();
        let mut writer = db.writer().unwrap();
        writer.add_document(&sentence(&["persist", "me"])).unwrap();
        writer.add_document(&sentence(&["persist"])).unwrap();
        writer.commit().unwrap();
        writer.add_document(&sentence(&["lost"])).unwrap();
    }

    let db = Database::open(Config::in_dir(dir.path())).unwrap();
    assert_eq!(db.revision(), 1);
    let reader = db.reader();
    assert_eq!(reader.get_term_frequency("persist").unwrap(), 2);
    assert_eq!(reader.get_term_frequency("lost").unwrap(), 0);
    assert_eq!(reader.last_docid().unwrap(), DocId(2));

    let mut writer = db.writer().unwrap();
    assert_eq!(writer.add_document(&sentence(&["next"])).unwrap(), DocId(3));
}

#[test]
fn writer_lock_spans_handles_on_one_directory() {
    let dir = tempfile::tempdir().unwrap();
    let a = Database::open(Config::in_dir(dir.path())).unwrap();
    let b = Database::open(Config::in_dir(dir.path())).unwrap();
    let writer = a.writer().unwrap();
    assert!(matches!(b.writer(), Err(e) if e.kind == ErrorKind::DatabaseLocked));
    // a failed attempt leaves b unlocked
    drop(writer);
    assert!(b.writer().is_ok());
}

#[test]
fn writer_starts_from_commits_made_through_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let a = Database::open(Config::in_dir(dir.path())).unwrap();
    let b = Database::open(Config::in_dir(dir.path())).unwrap();

    let mut writer = a.writer().unwrap();
    writer.add_document(&sentence(&["from_a"])).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let mut writer = b.writer().unwrap();
    assert_eq!(b.revision(), 1);
    assert_eq!(writer.add_document(&sentence(&["from_b"])).unwrap(), DocId(2));
    assert_eq!(writer.commit().unwrap(), 2);
    drop(writer);

    let db = Database::open(Config::in_dir(dir.path())).unwrap();
    let reader = db.reader();
    assert_eq!(reader.revision(), 2);
    assert_eq!(reader.get_term_frequency("from_a").unwrap(), 1);
    assert_eq!(reader.get_term_frequency("from_b").unwrap(), 1);
    assert_eq!(reader.doc_count().unwrap(), 2);
}
