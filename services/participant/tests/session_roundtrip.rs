//! Full session against an in-process coordinator: handshake, one fit, one
//! evaluate, clean disconnect.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use fedmaint_core::codec;
use fedmaint_core::dataset::Dataset;
use fedmaint_core::error::ClientError;
use fedmaint_core::model::{Model, SoftmaxClassifier};
use fedmaint_core::round::ParticipantHandler;

use participant_node::config::NodeConfig;
use participant_node::connection::ConnectionManager;
use participant_node::protocol::{RoundInstruction, RoundReply};
use participant_node::session;

use fedmaint_resilience::ConnectionState;

fn node_config(addr: &str) -> NodeConfig {
    NodeConfig {
        coordinator_addr: addr.to_string(),
        data_path: "unused.csv".to_string(),
        metrics_dir: std::env::temp_dir().display().to_string(),
        max_connect_attempts: 3,
        connect_retry_secs: 0,
        handshake_timeout_secs: 5,
        holdout_fraction: 0.2,
    }
}

fn balanced_dataset() -> Dataset {
    Dataset::new(
        vec![
            vec![0.0, 0.1],
            vec![0.1, 0.0],
            vec![0.2, 0.1],
            vec![4.0, 4.1],
            vec![4.1, 4.0],
            vec![3.9, 4.2],
        ],
        vec![0, 0, 0, 1, 1, 1],
    )
    .unwrap()
}

fn metrics_path() -> PathBuf {
    std::env::temp_dir().join(format!("fedmaint_session_{}.json", std::process::id()))
}

#[tokio::test]
async fn one_fit_one_evaluate_then_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let global = codec::encode(&SoftmaxClassifier::new(2).weights()).unwrap();

    let coordinator = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let send = |instruction: RoundInstruction| {
            let mut line = serde_json::to_vec(&instruction).unwrap();
            line.push(b'\n');
            line
        };

        writer
            .write_all(&send(RoundInstruction::Hello {
                coordinator: "test-coordinator".to_string(),
            }))
            .await
            .unwrap();

        writer
            .write_all(&send(RoundInstruction::Fit {
                parameters: global.clone(),
                config: Default::default(),
            }))
            .await
            .unwrap();
        let fit_line = lines.next_line().await.unwrap().unwrap();
        let fit_reply: RoundReply = serde_json::from_str(&fit_line).unwrap();

        writer
            .write_all(&send(RoundInstruction::Evaluate {
                parameters: global.clone(),
                config: Default::default(),
            }))
            .await
            .unwrap();
        let eval_line = lines.next_line().await.unwrap().unwrap();
        let eval_reply: RoundReply = serde_json::from_str(&eval_line).unwrap();

        writer
            .write_all(&send(RoundInstruction::Disconnect))
            .await
            .unwrap();

        (fit_reply, eval_reply)
    });

    let cfg = node_config(&addr);
    let path = metrics_path();
    let _ = std::fs::remove_file(&path);

    let mut manager = ConnectionManager::new(&cfg);
    let mut channel = manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Ready);

    let model = SoftmaxClassifier::new(2);
    let mut handler =
        ParticipantHandler::new("L".to_string(), model, balanced_dataset(), path.clone());
    session::serve(&mut channel, &mut handler).await.unwrap();
    manager.disconnect();

    let (fit_reply, eval_reply) = coordinator.await.unwrap();
    match fit_reply {
        RoundReply::FitResult {
            parameters,
            num_examples,
            loss,
        } => {
            // already balanced, so nothing was synthesized
            assert_eq!(num_examples, 6);
            assert!(loss >= 0.0);
            assert_eq!(parameters.len(), 2);
            assert_eq!(parameters[0].dims, vec![2, 6]);
            assert_eq!(parameters[1].dims, vec![6]);
        }
        other => panic!("expected fit result, got {other:?}"),
    }
    match eval_reply {
        RoundReply::EvaluateResult {
            num_examples,
            accuracy,
            f1_score,
            ..
        } => {
            assert_eq!(num_examples, 6);
            assert!((0.0..=1.0).contains(&accuracy));
            assert!((0.0..=1.0).contains(&f1_score));
        }
        other => panic!("expected evaluate result, got {other:?}"),
    }

    assert_eq!(handler.round(), 1);
    assert_eq!(handler.history().len(), 1);
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn unreachable_coordinator_exhausts_the_retry_budget() {
    // grab a port nobody is listening on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut cfg = node_config(&addr);
    cfg.max_connect_attempts = 2;

    let mut manager = ConnectionManager::new(&cfg);
    let err = manager.connect().await.unwrap_err();
    match err {
        ClientError::Connection { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected connection error, got {other:?}"),
    }
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}
