use mockgps_logic::MockLocationController;

use crate::{HostRequest, HostResponse};

/// Run one driver request against the daemon's controller and produce the
/// single response for it.
///
/// Requests the controller rejects never reach the host and answer with
/// [HostResponse::Error]. Start and stop answer once the host has handled
/// them, everything else answers with the current UI state.
pub async fn handle_request(controller: &MockLocationController, req: HostRequest) -> HostResponse {
    let mut ui = controller.subscribe();

    let res = match &req {
        HostRequest::Start {
            latitude,
            longitude,
        } => controller.request_start(latitude, longitude),
        HostRequest::Stop => controller.request_stop(),
        HostRequest::Status => Ok(()),
        HostRequest::ClearMessages => {
            controller.clear_messages();
            Ok(())
        }
    };

    if let Err(why) = res {
        return why.into();
    }

    if !req.awaits_host() {
        return controller.ui_state().into();
    }

    match ui.wait_for(|s| !s.is_loading).await {
        Ok(state) => HostResponse::State(state.clone()),
        Err(_) => HostResponse::Error("the mock location host is not running".to_string()),
    }
}
