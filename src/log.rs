#[macro_export]
macro_rules! info {
    ($ctx:expr,  $msg:expr) => {
        $crate::info!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        $crate::emit_event!($ctx, $crate::events::Event::Info(formatted));
    };
}

#[macro_export]
macro_rules! warn {
    ($ctx:expr, $msg:expr) => {
        $crate::warn!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        $crate::emit_event!($ctx, $crate::events::Event::Warning(formatted));
    };
}

#[macro_export]
macro_rules! error {
    ($ctx:expr, $msg:expr) => {
        $crate::error!($ctx, $msg,)
    };
    ($ctx:expr, $msg:expr, $($args:expr),* $(,)?) => {
        let formatted = format!($msg, $($args),*);
        $crate::emit_event!($ctx, $crate::events::Event::Error(formatted));
    };
}

#[macro_export]
macro_rules! emit_event {
    ($ctx:expr, $event:expr) => {
        $ctx.call_cb($event);
    };
}
