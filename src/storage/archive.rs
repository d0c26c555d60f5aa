// 目录归档流
//
// 把目录内容以 tar（仅存储，不压缩）格式增量写入有界通道，消费端按需
// 拉取。消费慢时生产端阻塞在通道上形成背压，整个归档过程不在内存中
// 物化；消费端断开后生产端在下一次写入时感知并立即终止遍历。

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use super::types::{StorageError, StorageErrorCode};

/// 单个数据块上限
const CHUNK_SIZE: usize = 64 * 1024;

/// 通道容量（数据块个数），与块大小共同决定最大飞行中字节数
const CHANNEL_CAPACITY: usize = 16;

/// 归档泵状态机：Idle → Streaming → {Completed | Aborted}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpState {
    Idle,
    Streaming,
    Completed,
    Aborted,
}

/// 有界通道背后的 Write 适配器
///
/// 攒满一个数据块才投递一次，避免把大量小写放大成通道消息
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buf(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(CHUNK_SIZE),
        ));
        // 消费端断开时通道关闭，以 BrokenPipe 向上传播终止遍历
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "归档消费端已断开"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buf()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buf()
    }
}

/// 目录归档字节流
///
/// 实现 `Stream<Item = io::Result<Bytes>>`，可直接作为 HTTP 响应体；
/// 中途出错时错误作为流的最后一项交给消费端，已投递的字节不回收
#[derive(Debug)]
pub struct ArchiveStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for ArchiveStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// 启动目录归档，返回可增量消费的字节流
///
/// 树遍历与 tar 写出在独立的阻塞任务中进行，与消费端并发
pub fn stream_directory(dir: PathBuf) -> ArchiveStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        ArchivePump::new(dir, tx).run();
    });

    ArchiveStream { rx }
}

/// 归档生产端
struct ArchivePump {
    dir: PathBuf,
    tx: mpsc::Sender<io::Result<Bytes>>,
    state: PumpState,
}

impl ArchivePump {
    fn new(dir: PathBuf, tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            dir,
            tx,
            state: PumpState::Idle,
        }
    }

    fn run(mut self) {
        self.state = PumpState::Streaming;

        match self.pump() {
            Ok(()) => {
                self.state = PumpState::Completed;
            }
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                // 消费端提前断开：停止遍历即可，无处可投递错误
                self.state = PumpState::Aborted;
            }
            Err(err) => {
                self.state = PumpState::Aborted;
                tracing::warn!("归档失败: {:?}, 错误: {}", self.dir, err);

                // 把错误作为流的最后一项交给消费端，传输层据此标记响应失败
                let aborted = StorageError::new(StorageErrorCode::ArchiveAborted)
                    .with_message(format!("归档流中途终止: {}", err))
                    .with_path(self.dir.to_string_lossy().to_string());
                let _ = self.tx.blocking_send(Err(io::Error::new(err.kind(), aborted)));
            }
        }

        tracing::debug!("归档泵退出: {:?}, 终态: {:?}", self.dir, self.state);
    }

    /// 遍历目录并写出归档
    ///
    /// 遍历顺序对同一文件系统快照是确定的（每层按文件名排序），
    /// 只收录普通文件；目录不单独成条目，空目录得到合法的空归档
    fn pump(&mut self) -> io::Result<()> {
        let writer = ChannelWriter::new(self.tx.clone());
        let mut builder = tar::Builder::new(writer);

        let walker = WalkDir::new(&self.dir)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let entry_name = archive_entry_name(&self.dir, entry.path())?;
            let mut file = File::open(entry.path())?;
            // 条目头（路径、大小、mtime、mode）+ 原样拷贝的内容
            builder.append_file(Path::new(&entry_name), &mut file)?;
        }

        // 写出归档结尾块并冲刷残余缓冲
        let mut writer = builder.into_inner()?;
        writer.flush()?;
        Ok(())
    }
}

/// 条目路径：相对被归档目录，统一正斜杠分隔
fn archive_entry_name(base: &Path, path: &Path) -> io::Result<String> {
    let rel = path
        .strip_prefix(base)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(rel
        .iter()
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
