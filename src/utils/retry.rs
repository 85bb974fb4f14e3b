use tokio::time::{sleep, Duration};

/// Runs `f` until it succeeds, `should_retry` rejects the error, or `attempts` runs out.
///
/// The delay grows linearly with the attempt number.
pub async fn with_retry<F, Fut, T, E, P>(
    f: F,
    attempts: u32,
    delay: Duration,
    should_retry: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts || !should_retry(&e) {
                    return Err(e);
                }
                sleep(delay * attempt).await;
            }
        }
    }
}
