pub mod consecutive_alarm;
