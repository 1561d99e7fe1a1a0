pub mod automation_run;
pub mod tenant;
pub mod webhook_event;
