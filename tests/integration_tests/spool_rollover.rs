// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use horace::{
    codec::OctetReader,
    endpoint::SessionWriter,
    models::{Attribute, AttributeList, Record, ids::ATTR_SEQNUM},
    session::SessionContext,
    spool::{FileSessionWriter, FilestoreScan, spoolfile::SpoolfileName},
};
use serial_test::serial;

use crate::integration_tests::common::{payload_session, source_id, timestamp};

/// File rollover at capacity: with `filesize=64` and ten events of
/// on-wire length 50, every event lands in its own spoolfile and each
/// file begins with a session record identical to the initial one.
#[tokio::test]
#[serial]
async fn test_rollover_reemits_session_record() {
    let dir = tempfile::TempDir::new().expect("cannot create temp dir");
    let root = dir.path().to_path_buf();
    let srcid = source_id("h1");

    let (mut sb, _payload, channel) =
        payload_session(&srcid, timestamp(1_700_000_000));
    let binary = sb.define_attribute(
        "blob",
        horace::models::ids::AttrFormat::Binary,
    );
    let srec = sb.build();

    let mut writer = FileSessionWriter::new(root.clone(), &srcid, 64, None)
        .await
        .expect("cannot open session writer");
    writer.write(&srec).await.expect("write failed");

    for seqnum in 0..10u64 {
        let rec = Record::new(
            channel,
            AttributeList::new()
                .with(Attribute::unsigned(ATTR_SEQNUM, seqnum))
                .with(Attribute::binary(binary, vec![0xabu8; 43])),
        );
        assert_eq!(rec.wire_length(), 50);
        writer.write(&rec).await.expect("write failed");
    }
    drop(writer);

    let scan = FilestoreScan::scan(&root.join(srcid.as_str())).expect("scan failed");
    assert!(scan.next_filenum - scan.first_filenum >= 10);

    // Every spoolfile opens with the same session record, and the ten
    // events come back in order across the files.
    let mut ctx = SessionContext::new();
    let mut seqnums = Vec::new();
    for filenum in scan.first_filenum..scan.next_filenum {
        let path = root
            .join(srcid.as_str())
            .join(SpoolfileName::format(filenum, scan.minwidth));
        let file = tokio::fs::File::open(&path).await.expect("cannot open file");
        let mut reader = OctetReader::new(file);

        let first = Record::read(&mut reader, &ctx).await.expect("read failed");
        assert_eq!(first.to_bytes(), srec.to_bytes());
        ctx.absorb_session_record(&first).expect("bad session record");

        while let Ok(rec) = Record::read(&mut reader, &ctx).await {
            if rec.is_event() {
                seqnums.push(rec.update_seqnum(u64::MAX));
            }
        }
    }
    assert_eq!(seqnums, (0..10).collect::<Vec<u64>>());
}
