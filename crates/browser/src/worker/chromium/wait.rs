use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventFrameNavigated, EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream, StreamExt};
use rocky_core::{FrameId, PageEvent, RenderError, ResourceKind, WaitConfig};
use serde_json::json;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::shared::to_render_error;
use crate::wait::{WaitCoordinator, WaitOutcome};

/// Navigate `page` to `url` and wait until it is ready.
///
/// Options are validated before the page is touched. Event listeners are
/// attached before the navigate command so no early request is missed.
pub async fn navigate_and_wait(
    page: &Page,
    url: &str,
    config: &WaitConfig,
    log_events: bool,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, RenderError> {
    let coordinator = WaitCoordinator::new(config)?;

    page.execute(EnableParams::default())
        .await
        .map_err(|e| to_render_error(e, "EnableNetwork"))?;
    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(|e| to_render_error(e, "EnableLifecycle"))?;

    let classifier = coordinator.classifier();
    if let Some(frame_id) = page
        .mainframe()
        .await
        .map_err(|e| to_render_error(e, "MainFrame"))?
    {
        classifier.seed_main_frame(FrameId::from(frame_id.inner().as_str()));
    }

    let mut events = subscribe(page).await?;
    let pump = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if log_events {
                debug!(?event, "page event");
            }
            classifier.handle(event);
        }
    });

    let result = async {
        navigate(page, url, config, cancel).await?;
        coordinator.wait(cancel).await
    }
    .await;
    pump.abort();
    result
}

async fn navigate(
    page: &Page,
    url: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<(), RenderError> {
    debug!(url, "navigating");
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(RenderError::cancelled("navigation cancelled by caller")
                .with_context(json!({ "url": url })));
        }
        response = timeout(config.timeout, page.execute(NavigateParams::new(url))) => response,
    };

    let response = response
        .map_err(|_| {
            RenderError::deadline_exceeded(format!(
                "navigate command did not return within {}ms",
                config.timeout.as_millis()
            ))
            .with_context(json!({ "url": url, "timeout_ms": config.timeout.as_millis() as u64 }))
        })?
        .map_err(|e| to_render_error(e, "Navigate"))?;

    if let Some(error_text) = &response.result.error_text {
        return Err(RenderError::navigation_error(format!(
            "navigation to {} failed: {}",
            url, error_text
        ))
        .with_context(json!({ "url": url, "error_text": error_text })));
    }
    Ok(())
}

async fn subscribe(page: &Page) -> Result<BoxStream<'static, PageEvent>, RenderError> {
    let navigated = page
        .event_listener::<EventFrameNavigated>()
        .await
        .map_err(|e| to_render_error(e, "Listen"))?
        .map(|e| frame_navigated(&e))
        .boxed();
    let requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| to_render_error(e, "Listen"))?
        .map(|e| request_will_be_sent(&e))
        .boxed();
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(|e| to_render_error(e, "Listen"))?
        .map(|e| PageEvent::LoadingFinished {
            request_id: e.request_id.inner().as_str().into(),
        })
        .boxed();
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(|e| to_render_error(e, "Listen"))?
        .map(|e| PageEvent::LoadingFailed {
            request_id: e.request_id.inner().as_str().into(),
            error_text: e.error_text.clone(),
        })
        .boxed();
    let lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(|e| to_render_error(e, "Listen"))?
        .map(|e| PageEvent::Lifecycle {
            frame_id: e.frame_id.inner().as_str().into(),
            loader_id: e.loader_id.inner().as_str().into(),
            name: e.name.clone(),
        })
        .boxed();

    trace!("subscribed to page events");
    Ok(stream::select_all(vec![navigated, requests, finished, failed, lifecycle]).boxed())
}

fn frame_navigated(e: &EventFrameNavigated) -> PageEvent {
    PageEvent::FrameNavigated {
        frame_id: e.frame.id.inner().as_str().into(),
        parent_id: e
            .frame
            .parent_id
            .as_ref()
            .map(|p| FrameId::from(p.inner().as_str())),
        loader_id: e.frame.loader_id.inner().as_str().into(),
    }
}

fn request_will_be_sent(e: &EventRequestWillBeSent) -> PageEvent {
    let kind = e
        .r#type
        .as_ref()
        .map(|t| ResourceKind::from_cdp(t.as_ref()))
        .unwrap_or(ResourceKind::Other);
    PageEvent::RequestWillBeSent {
        request_id: e.request_id.inner().as_str().into(),
        loader_id: e.loader_id.inner().as_str().into(),
        frame_id: e.frame_id.as_ref().map(|f| FrameId::from(f.inner().as_str())),
        kind,
        url: e.request.url.clone(),
    }
}
