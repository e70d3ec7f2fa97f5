use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// 有界并发执行：最多 `limit` 个任务同时运行，结果经 channel 交给唯一的汇总方。
/// 返回 None 或 panic 的任务不产生结果，也不重试。返回时所有任务都已结束。
/// 结果顺序取决于完成顺序，调用方需自行排序。
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
{
    if items.is_empty() {
        return vec![];
    }
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let work = Arc::new(work);
    let (tx, mut rx) = mpsc::channel::<R>(items.len());

    for item in items {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };
        let tx = tx.clone();
        let work = work.clone();
        tokio::spawn(async move {
            let _p = permit;
            if let Some(r) = (work.as_ref())(item).await {
                let _ = tx.send(r).await;
            }
        });
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(r) = rx.recv().await {
        results.push(r);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_results_collected_and_failures_dropped() {
        let mut got = fan_out((0..20).collect::<Vec<u32>>(), 4, |i| async move {
            tokio::time::sleep(Duration::from_millis((20 - i as u64) % 7)).await;
            if i % 5 == 0 { None } else { Some(i) }
        })
        .await;
        got.sort();
        assert_eq!(got.len(), 16);
        assert!(!got.contains(&5));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());
        let got = fan_out((0..30).collect::<Vec<u32>>(), 3, move |i| {
            let r = r.clone();
            let p = p.clone();
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                r.fetch_sub(1, Ordering::SeqCst);
                Some(i)
            }
        })
        .await;
        assert_eq!(got.len(), 30);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
