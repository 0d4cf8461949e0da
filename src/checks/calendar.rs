use std::sync::Arc;

use chrono::TimeDelta;
use chrono::Utc;

use super::Configurable;
use super::http::Endpoint;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::CalendarParser;
use crate::host::Host;

/// Active while an event of a remote calendar is taking place.
#[derive(Debug)]
pub struct ActiveCalendarEvent {
    endpoint: Endpoint,
    parser: Arc<dyn CalendarParser>,
}

impl ActiveCalendarEvent {
    pub fn new(endpoint: Endpoint, parser: Arc<dyn CalendarParser>) -> Self {
        Self { endpoint, parser }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let data = self.endpoint.get_bytes().await?;

        let start = Utc::now();
        let end = start + TimeDelta::minutes(1);
        let events = self
            .parser
            .events_between(&data, start, end)
            .map_err(|e| CheckError::temporary(format!("Cannot parse calendar: {e}")))?;

        Ok(events
            .first()
            .map(|event| format!("Calendar event {event} is active"))
            .into())
    }
}

impl Configurable for ActiveCalendarEvent {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["url", "timeout"])?;
        let parser = host
            .calendar
            .clone()
            .ok_or_else(|| ConfigurationError::invalid("class", "no calendar parser is available"))?;
        Ok(Self::new(Endpoint::from_section(section, None)?, parser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::testing::FakeCalendar;

    async fn serve(server: &mut mockito::ServerGuard, status: usize) {
        server
            .mock("GET", "/cal.ics")
            .with_status(status)
            .with_body("BEGIN:VCALENDAR\nEND:VCALENDAR\n")
            .create_async()
            .await;
    }

    fn create(server: &mockito::ServerGuard, calendar: &Arc<FakeCalendar>) -> ActiveCalendarEvent {
        let host = Host {
            calendar: Some(calendar.clone()),
            ..testing::host()
        };
        let section =
            CheckSection::parse("Calendar", &format!(r#"url = "{}/cal.ics""#, server.url())).unwrap();
        ActiveCalendarEvent::create(&section, &host).unwrap()
    }

    #[tokio::test]
    async fn test_current_event_is_active() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, 200).await;
        let calendar = Arc::new(FakeCalendar::new(&["Backup", "Movie night"]));
        let check = create(&server, &calendar);

        assert_eq!(
            check.check().await.unwrap().reason(),
            Some("Calendar event Backup is active")
        );
        assert_eq!(calendar.seen(), vec![b"BEGIN:VCALENDAR\nEND:VCALENDAR\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_no_events_is_inactive() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, 200).await;
        let check = create(&server, &Arc::new(FakeCalendar::new(&[])));

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
    }

    #[tokio::test]
    async fn test_download_failure_is_temporary() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, 404).await;
        let calendar = Arc::new(FakeCalendar::new(&["Backup"]));
        let check = create(&server, &calendar);

        assert!(matches!(
            check.check().await,
            Err(CheckError::Temporary(_))
        ));
        assert!(calendar.seen().is_empty());
    }

    #[test]
    fn test_requires_parser() {
        let section = CheckSection::parse("Calendar", r#"url = "http://localhost/cal.ics""#).unwrap();
        assert!(ActiveCalendarEvent::create(&section, &testing::host()).is_err());
    }
}
