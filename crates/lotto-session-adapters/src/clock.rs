use async_trait::async_trait;

use lotto_session_core::{ClockPort, PortError};

#[derive(Debug, Clone, Default)]
pub struct SystemClockAdapter;

#[async_trait(?Send)]
impl ClockPort for SystemClockAdapter {
    fn now_ms(&self) -> Result<u64, PortError> {
        #[cfg(target_arch = "wasm32")]
        {
            let now = web_time::SystemTime::now()
                .duration_since(web_time::UNIX_EPOCH)
                .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
            return Ok(now.as_millis() as u64);
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
            Ok(now.as_millis() as u64)
        }
    }

    async fn sleep_ms(&self, ms: u64) {
        #[cfg(target_arch = "wasm32")]
        gloo_timers::future::TimeoutFuture::new(ms.min(u32::MAX as u64) as u32).await;
        #[cfg(not(target_arch = "wasm32"))]
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}
