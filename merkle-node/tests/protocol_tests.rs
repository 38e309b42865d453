//! End-to-end protocol tests: real authority, real sockets

use std::sync::Arc;
use std::time::Duration;

use merkle_node::retry::RetryConfig;
use merkle_node::shutdown::Shutdown;
use merkle_node::wire::{MessageReader, MessageWriter, END_OF_PATH};
use merkle_node::{AuthorityService, ClientConfig, NodeError, ValidityClient};
use merkle_proof::{fold, hash_text, Hash, HashAlgorithm, ProofIndex, SiblingPath};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

const ALG: HashAlgorithm = HashAlgorithm::Sha256;

fn h(text: &str) -> Hash {
    hash_text(&ALG, text)
}

struct Fixture {
    root: Hash,
    valid_tx: Hash,
    valid_path: SiblingPath,
    invalid_tx: Hash,
    unknown_tx: Hash,
    index: ProofIndex,
}

fn fixture() -> Fixture {
    let valid_tx = h("0000000001");
    let valid_path: SiblingPath = vec![h("a"), h("b"), h("c")].into();
    let root = fold(&ALG, &valid_tx, &valid_path);

    let invalid_tx = h("0000000020");
    let mut index = ProofIndex::with_root(root.clone());
    index.insert(valid_tx.clone(), valid_path.clone());
    index.insert(invalid_tx.clone(), vec![h("x"), h("y")].into());

    Fixture {
        root,
        valid_tx,
        valid_path,
        invalid_tx,
        unknown_tx: h("0000000099"),
        index,
    }
}

impl Fixture {
    fn index_path(&self, tx: &Hash) -> SiblingPath {
        use merkle_proof::ProofSource;
        self.index.siblings_for(tx).unwrap()
    }
}

async fn start_authority(index: ProofIndex, max_sessions: Option<usize>) -> (u16, broadcast::Sender<()>) {
    let authority = AuthorityService::new(Arc::new(index))
        .with_max_sessions(max_sessions)
        .bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = authority.local_addr().unwrap().port();
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(authority.run(Shutdown::wait(rx)));
    (port, tx)
}

fn client_config(port: u16, root: Hash, queries: Vec<Hash>) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port, root, queries)
}

/// Accepts one connection, answers `answer` queries with an empty path, then
/// reads forever without replying
async fn start_stalling_authority(answer: usize) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, write) = stream.into_split();
        let mut reader = MessageReader::new(BufReader::new(read));
        let mut writer = MessageWriter::new(write);

        for _ in 0..answer {
            if reader.next_frame().await.unwrap().is_none() {
                return;
            }
            writer.send_path(&SiblingPath::new()).await.unwrap();
        }
        while let Ok(Some(_)) = reader.next_frame().await {}
    });

    port
}

#[tokio::test]
async fn test_valid_transaction_is_reported_valid() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let report = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.valid_tx.clone()]))
        .check_all()
        .await
        .unwrap();

    assert_eq!(report.valid().cloned().collect::<Vec<_>>(), vec![fx.valid_tx]);
    assert_eq!(report.invalid_count(), 0);
    assert_eq!(report.verdicts[0].path_len, fx.valid_path.len());
}

#[tokio::test]
async fn test_path_folding_elsewhere_is_reported_invalid() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let report = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.invalid_tx.clone()]))
        .check_all()
        .await
        .unwrap();

    assert_eq!(report.invalid().cloned().collect::<Vec<_>>(), vec![fx.invalid_tx]);
    assert_eq!(report.valid_count(), 0);
}

#[tokio::test]
async fn test_mixed_queries_keep_order_within_groups() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;
    let queries = vec![
        fx.invalid_tx.clone(),
        fx.valid_tx.clone(),
        fx.unknown_tx.clone(),
        fx.valid_tx.clone(),
    ];

    let report = ValidityClient::new(client_config(port, fx.root.clone(), queries))
        .check_all()
        .await
        .unwrap();

    assert_eq!(report.verdicts.len(), 4);
    assert_eq!(
        report.invalid().cloned().collect::<Vec<_>>(),
        vec![fx.invalid_tx.clone(), fx.unknown_tx.clone()]
    );
    assert_eq!(
        report.valid().cloned().collect::<Vec<_>>(),
        vec![fx.valid_tx.clone(), fx.valid_tx.clone()]
    );
    // Unknown transactions come back with an empty path
    assert_eq!(report.verdicts[2].path_len, 0);
}

#[tokio::test]
async fn test_root_itself_with_empty_path_is_valid() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let report = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.root.clone()]))
        .check_all()
        .await
        .unwrap();

    assert!(report.all_valid());
}

#[tokio::test]
async fn test_two_queries_then_close_gets_exactly_two_paths() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let script = format!("{}\n{}\nclose\n", fx.valid_tx, fx.invalid_tx);
    stream.write_all(script.as_bytes()).await.unwrap();

    // The authority closes the socket after `close`, so this reaches EOF
    let mut received = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut received))
        .await
        .expect("authority did not close the session")
        .unwrap();

    let lines: Vec<&str> = received.lines().collect();
    assert_eq!(lines.iter().filter(|l| **l == END_OF_PATH).count(), 2);
    assert_eq!(lines.len(), 3 + 1 + 2 + 1);
    assert_eq!(lines.last(), Some(&END_OF_PATH));
    assert_eq!(lines[0], fx.valid_path.as_slice()[0].as_str());
}

#[tokio::test]
async fn test_interleaved_sessions_get_their_own_answers() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let open = move || async move {
        let (read, write) = TcpStream::connect(("127.0.0.1", port)).await.unwrap().into_split();
        (MessageReader::new(BufReader::new(read)), MessageWriter::new(write))
    };
    let (mut reader_a, mut writer_a) = open().await;
    let (mut reader_b, mut writer_b) = open().await;

    writer_a.send_query(&fx.valid_tx).await.unwrap();
    writer_b.send_query(&fx.invalid_tx).await.unwrap();

    // Drain B before A
    let path_b = reader_b.read_path().await.unwrap();
    writer_b.send_query(&fx.valid_tx).await.unwrap();
    let path_a = reader_a.read_path().await.unwrap();
    let path_b2 = reader_b.read_path().await.unwrap();

    assert_eq!(path_a, fx.valid_path);
    assert_eq!(path_b, fx.index_path(&fx.invalid_tx));
    assert_eq!(path_b2, fx.valid_path);

    writer_a.send_close().await.unwrap();
    writer_b.send_close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_clients_are_isolated() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    let mut first = ValidityClient::new(client_config(
        port,
        fx.root.clone(),
        vec![fx.valid_tx.clone(), fx.invalid_tx.clone()],
    ));
    let mut second = ValidityClient::new(client_config(
        port,
        fx.root.clone(),
        vec![fx.unknown_tx.clone(), fx.valid_tx.clone()],
    ));

    let (a, b) = tokio::join!(first.check_all(), second.check_all());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.valid().cloned().collect::<Vec<_>>(), vec![fx.valid_tx.clone()]);
    assert_eq!(a.invalid().cloned().collect::<Vec<_>>(), vec![fx.invalid_tx.clone()]);
    assert_eq!(b.valid().cloned().collect::<Vec<_>>(), vec![fx.valid_tx.clone()]);
    assert_eq!(b.invalid().cloned().collect::<Vec<_>>(), vec![fx.unknown_tx.clone()]);
}

#[tokio::test]
async fn test_broken_session_does_not_affect_others() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), None).await;

    // Oversized frame aborts that session only
    let mut rogue = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    rogue.write_all(&vec![b'f'; 10_000]).await.unwrap();
    drop(rogue);

    let report = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.valid_tx.clone()]))
        .check_all()
        .await
        .unwrap();
    assert!(report.all_valid());
}

#[tokio::test]
async fn test_session_limit_defers_extra_clients() {
    let fx = fixture();
    let (port, _shutdown) = start_authority(fx.index.clone(), Some(1)).await;

    let (read_a, write_a) = TcpStream::connect(("127.0.0.1", port)).await.unwrap().into_split();
    let mut reader_a = MessageReader::new(BufReader::new(read_a));
    let mut writer_a = MessageWriter::new(write_a);
    writer_a.send_query(&fx.valid_tx).await.unwrap();
    assert_eq!(reader_a.read_path().await.unwrap(), fx.valid_path);

    let (read_b, write_b) = TcpStream::connect(("127.0.0.1", port)).await.unwrap().into_split();
    let mut reader_b = MessageReader::new(BufReader::new(read_b));
    let mut writer_b = MessageWriter::new(write_b);
    writer_b.send_query(&fx.valid_tx).await.unwrap();

    let waiting = tokio::time::timeout(Duration::from_millis(200), reader_b.read_path()).await;
    assert!(waiting.is_err(), "second session should wait for a free slot");

    writer_a.send_close().await.unwrap();
    drop(reader_a);

    let path = tokio::time::timeout(Duration::from_secs(5), reader_b.read_path())
        .await
        .expect("second session never served")
        .unwrap();
    assert_eq!(path, fx.valid_path);
}

#[tokio::test]
async fn test_timeout_returns_partial_verdicts() {
    let fx = fixture();
    let port = start_stalling_authority(1).await;

    let mut config = client_config(port, fx.root.clone(), vec![fx.root.clone(), fx.valid_tx.clone()]);
    config.query_timeout = Some(Duration::from_millis(200));

    let err = ValidityClient::new(config).check_all().await.unwrap_err();
    assert_eq!(err.requested, 2);
    assert_eq!(err.partial.verdicts.len(), 1);
    assert!(err.partial.verdicts[0].valid);
    assert!(matches!(err.source, NodeError::Timeout { .. }));
}

#[tokio::test]
async fn test_cancellation_aborts_session() {
    let fx = fixture();
    let port = start_stalling_authority(0).await;
    let (cancel_tx, cancel_rx) = broadcast::channel(1);

    let mut client = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.valid_tx.clone()]))
        .with_cancellation(cancel_rx);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = cancel_tx.send(());
    });

    let err = tokio::time::timeout(Duration::from_secs(5), client.check_all())
        .await
        .expect("cancellation was ignored")
        .unwrap_err();
    assert!(matches!(err.source, NodeError::Cancelled));
    assert!(err.partial.verdicts.is_empty());
}

#[tokio::test]
async fn test_missing_terminator_is_protocol_violation() {
    let fx = fixture();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        let _ = stream.read(&mut buf).await;
        let sibling = format!("{}\n", h("a"));
        stream.write_all(sibling.as_bytes()).await.unwrap();
        // Hang up without the terminator
    });

    let err = ValidityClient::new(client_config(port, fx.root.clone(), vec![fx.valid_tx.clone()]))
        .check_all()
        .await
        .unwrap_err();
    assert!(matches!(err.source, NodeError::ProtocolViolation(_)));
}

#[tokio::test]
async fn test_unreachable_authority_is_connection_error() {
    let fx = fixture();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = client_config(port, fx.root.clone(), vec![fx.valid_tx.clone()]);
    config.retry = RetryConfig {
        max_retries: 1,
        initial_delay_ms: 10,
        ..RetryConfig::default()
    };

    let err = ValidityClient::new(config).check_all().await.unwrap_err();
    assert!(matches!(err.source, NodeError::Connection(_)));
    assert!(err.partial.verdicts.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let fx = fixture();
    let authority = AuthorityService::new(Arc::new(fx.index))
        .bind("127.0.0.1:0")
        .await
        .unwrap();
    let shutdown = Shutdown::default();
    let handle = tokio::spawn(authority.run(Shutdown::wait(shutdown.subscribe())));

    shutdown.trigger();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("authority ignored shutdown")
        .unwrap()
        .unwrap();
}
