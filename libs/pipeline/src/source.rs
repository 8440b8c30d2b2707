use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use relay_api::{Framing, RecordHandler, codec};

use crate::PipelineError;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════
//  Bind helpers — единственная фатальная ошибка stage'а
// ═══════════════════════════════════════════════════════════════

pub async fn bind_datagram(addr: &str) -> Result<UdpSocket, PipelineError> {
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|e| PipelineError::Bind { addr: addr.to_string(), source: e })?;
    tracing::info!(%addr, "udp listening");
    Ok(socket)
}

pub async fn bind_stream(addr: &str) -> Result<TcpListener, PipelineError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PipelineError::Bind { addr: addr.to_string(), source: e })?;
    tracing::info!(%addr, "tcp listening");
    Ok(listener)
}

// ═══════════════════════════════════════════════════════════════
//  Datagram source — один receive loop, без пула
// ═══════════════════════════════════════════════════════════════

/// Запустить datagram source: одна датаграмма = одна запись → handler.
///
/// Пула нет: датаграмма самодостаточна и не несёт состояния соединения.
/// Back-pressure handler'а (полная очередь) останавливает receive loop.
pub fn spawn_datagram_source(
    name: String,
    socket: UdpSocket,
    max_datagram: usize,
    handler: Arc<dyn RecordHandler>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; max_datagram.max(1)];

        loop {
            let (n, peer) = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(stage = %name, error = %e, "datagram receive error");
                        continue;
                    }
                },
            };

            let record = match codec::decode_bytes(&buf[..n]) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(stage = %name, %peer, error = %e, "bad datagram, skipping");
                    continue;
                }
            };
            tracing::debug!(stage = %name, %peer, source_id = %record.source_id, "datagram received");

            if let Err(e) = handler.handle(record).await {
                if e.is_cancelled() {
                    break;
                }
                tracing::warn!(stage = %name, %peer, kind = %e.kind(), error = %e, "record rejected");
            }
        }

        tracing::info!(stage = %name, "datagram source finished");
    })
}

// ═══════════════════════════════════════════════════════════════
//  Stream source — accept loop → пул worker'ов → framed reads
// ═══════════════════════════════════════════════════════════════

/// Запустить stream source: accept loop передаёт соединения через канал
/// фиксированному пулу из `workers` обработчиков.
///
/// Каждое соединение несёт много фреймов; EOF или ошибка чтения закрывает
/// только это соединение.
pub fn spawn_stream_source(
    name: String,
    listener: TcpListener,
    framing: Arc<dyn Framing>,
    handler: Arc<dyn RecordHandler>,
    workers: usize,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let workers = workers.max(1);

        // Канал: accept loop → пул worker'ов
        let (conn_tx, conn_rx) = mpsc::channel::<(TcpStream, SocketAddr)>(workers);
        let conn_rx = Arc::new(Mutex::new(conn_rx));

        let mut pool = Vec::with_capacity(workers);
        for worker in 0..workers {
            let task_name = name.clone();
            let task_rx = conn_rx.clone();
            let task_framing = framing.clone();
            let task_handler = handler.clone();
            let task_token = token.clone();
            pool.push(tokio::spawn(async move {
                loop {
                    let next = {
                        let mut rx = task_rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = task_token.cancelled() => None,
                            conn = rx.recv() => conn,
                        }
                    };
                    let Some((stream, peer)) = next else { break };

                    tracing::info!(stage = %task_name, worker, %peer, "new connection");
                    handle_stream_connection(
                        &task_name,
                        stream,
                        peer,
                        &*task_framing,
                        &*task_handler,
                        &task_token,
                    )
                    .await;
                    tracing::info!(stage = %task_name, worker, %peer, "connection closed");
                }
            }));
        }

        loop {
            let accepted = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    let sent = tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        sent = conn_tx.send(conn) => sent,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(stage = %name, error = %e, "accept error");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        drop(conn_tx);
        for h in pool {
            let _ = h.await;
        }
        tracing::info!(stage = %name, "stream source finished");
    })
}

/// Чтение одного соединения: буфер → framing → codec → handler.
async fn handle_stream_connection(
    name: &str,
    mut stream: TcpStream,
    peer: SocketAddr,
    framing: &dyn Framing,
    handler: &dyn RecordHandler,
    token: &CancellationToken,
) {
    let mut buf = Vec::with_capacity(8192);
    let mut tmp = [0u8; 4096];

    loop {
        loop {
            match framing.decode(&buf) {
                Ok(Some((frame, consumed))) => {
                    buf.drain(..consumed);
                    if !process_frame(name, peer, &frame, handler).await {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(stage = %name, %peer, error = %e, "framing error, disconnecting");
                    return;
                }
            }
        }

        let read = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            read = stream.read(&mut tmp) => read,
        };
        match read {
            Ok(0) => {
                // Последняя строка без '\n' тоже считается фреймом
                if !buf.is_empty() {
                    process_frame(name, peer, &buf, handler).await;
                }
                return;
            }
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(e) => {
                tracing::warn!(stage = %name, %peer, error = %e, "read error");
                return;
            }
        }
    }
}

/// Обработать один фрейм. `false` = соединение нужно закрыть (shutdown).
async fn process_frame(name: &str, peer: SocketAddr, frame: &[u8], handler: &dyn RecordHandler) -> bool {
    if frame.iter().all(u8::is_ascii_whitespace) {
        return true;
    }

    let record = match codec::decode_bytes(frame) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                stage = %name,
                %peer,
                error = %e,
                data = %String::from_utf8_lossy(frame),
                "bad record, skipping"
            );
            return true;
        }
    };

    match handler.handle(record).await {
        Ok(()) => true,
        Err(e) if e.is_cancelled() => false,
        Err(e) => {
            tracing::warn!(stage = %name, %peer, kind = %e.kind(), error = %e, "record rejected");
            true
        }
    }
}
