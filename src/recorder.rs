// ===============================
// src/recorder.rs
// ===============================
//
// JSONL audit recorder yang ringan & tahan banting:
// - Tulis setiap AuditEvent ke file .jsonl (append).
// - Bufer dengan BufWriter agar hemat syscall.
// - Flush periodik tiap 1s dan/atau tiap 1000 event.
// - Otomatis membuat parent directory jika belum ada.
// - Jika tulis gagal, coba reopen file dan lanjut.
//
// ENV: set `RECORD_FILE=/path/to/audit.jsonl` agar aktif (lihat main.rs).
// Secret / API key tidak pernah masuk ke event.
//
use std::path::Path;

use serde::Serialize;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::{ResultEnvelope, SignedRequest, WithdrawalRequest};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Dispatched {
        ts_ms: u64,
        job_id: String,
        asset: String,
        address: String,
        amount: String,
        recv_window: u64,
        timestamp: u64,
        signature: String,
    },
    Completed {
        ts_ms: u64,
        job_id: String,
        status_code: u16,
        outcome: &'static str,
    },
}

impl AuditEvent {
    pub fn dispatched(job_id: &str, req: &WithdrawalRequest, signed: &SignedRequest) -> Self {
        AuditEvent::Dispatched {
            ts_ms: crate::binance::timestamp_ms(),
            job_id: job_id.to_string(),
            asset: req.asset.clone(),
            address: req.address.clone(),
            amount: req.amount.clone(),
            recv_window: req.recv_window,
            timestamp: req.timestamp,
            signature: signed.signature.clone(),
        }
    }

    pub fn completed(env: &ResultEnvelope, outcome: &'static str) -> Self {
        AuditEvent::Completed {
            ts_ms: crate::binance::timestamp_ms(),
            job_id: env.job_id.clone(),
            status_code: env.status_code,
            outcome,
        }
    }
}

async fn open_writer(path: &str) -> std::io::Result<BufWriter<tokio::fs::File>> {
    // Pastikan parent directory ada (kalau ada)
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(?e, %path, "recorder: create_dir_all failed");
            }
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

pub async fn run(mut rx: mpsc::Receiver<AuditEvent>, path: String) {
    info!(%path, "recorder: started");
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, audit disabled");
            return;
        }
    };

    // Flush periodik (tiap 1 detik) + flush berbasis jumlah event
    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;
    const FLUSH_EVERY_N_EVENTS: u32 = 1000;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let mut line = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                error!(?e, "recorder: serialize error, skip event");
                                continue;
                            }
                        };
                        line.push('\n');

                        if let Err(e) = writer.write_all(line.as_bytes()).await {
                            error!(?e, "recorder: write_all failed, attempting reopen");
                            match open_writer(&path).await {
                                Ok(w) => writer = w,
                                Err(e2) => {
                                    error!(?e2, "recorder: reopen failed, drop event");
                                    continue;
                                }
                            }
                            // coba lagi sekali setelah reopen
                            if let Err(e2) = writer.write_all(line.as_bytes()).await {
                                error!(?e2, "recorder: write_all failed again after reopen, drop event");
                                continue;
                            }
                        }

                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                            let _ = writer.flush().await;
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        // Channel closed: flush dan keluar
                        let _ = writer.flush().await;
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}
