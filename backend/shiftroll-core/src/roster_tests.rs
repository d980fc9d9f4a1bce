// src/roster_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::TestClock;
    use crate::reconcile::EffectiveDayState;
    use crate::records::{Employee, NewEmployee};
    use crate::roster::*;
    use crate::store::{InMemoryStore, RecordStore};
    use crate::time_grid::ClockTime;
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    // Helper to build a service over an empty store with the clock well before
    // the March 2025 deadline (2025-02-18 23:59:59).
    fn setup() -> (RosterService, Arc<InMemoryStore>, TestClock) {
        let store = Arc::new(InMemoryStore::new());
        let clock = TestClock::new("2025-02-10 09:00:00");
        let service = RosterService::new(store.clone(), Arc::new(clock.clone()), dec!(40));
        (service, store, clock)
    }

    async fn add(
        service: &RosterService,
        name: &str,
        defaults: Option<(&str, &str)>,
        base_task: &str,
    ) -> Employee {
        service
            .add_employee(NewEmployee {
                name: name.to_string(),
                role: "staff".to_string(),
                base_task: base_task.to_string(),
                default_start_time: defaults.map(|(s, _)| t(s)),
                default_end_time: defaults.map(|(_, e)| t(e)),
            })
            .await
            .unwrap()
    }

    // --- Shift assignment ---

    #[tokio::test]
    async fn assign_without_fields_uses_employee_defaults() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", Some(("10:00", "18:00")), "Register").await;

        let shift = service
            .assign_shift(emp.id, d("2025-03-03"), ShiftPatch::default())
            .await
            .unwrap();
        assert_eq!((shift.start_time, shift.end_time), (t("10:00"), t("18:00")));
        assert_eq!(shift.assigned_task, "Register");
    }

    #[tokio::test]
    async fn assign_without_defaults_uses_nine_to_five() {
        let (service, _, _) = setup();
        let emp = add(&service, "Ren", None, "").await;

        let shift = service
            .assign_shift(emp.id, d("2025-03-03"), ShiftPatch::default())
            .await
            .unwrap();
        assert_eq!((shift.start_time, shift.end_time), (t("09:00"), t("17:00")));
        assert_eq!(shift.assigned_task, "");
    }

    #[tokio::test]
    async fn partial_patch_keeps_existing_fields() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", Some(("10:00", "18:00")), "Register").await;
        let date = d("2025-03-03");

        service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    start: Some(t("08:00")),
                    end: Some(t("12:00")),
                    task: Some("Floor".to_string()),
                },
            )
            .await
            .unwrap();
        let shift = service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    end: Some(t("14:30")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((shift.start_time, shift.end_time), (t("08:00"), t("14:30")));
        assert_eq!(shift.assigned_task, "Floor");
    }

    #[tokio::test]
    async fn explicit_empty_task_is_kept() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", None, "Register").await;
        let shift = service
            .assign_shift(
                emp.id,
                d("2025-03-03"),
                ShiftPatch {
                    task: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(shift.assigned_task, "");
    }

    #[tokio::test]
    async fn reassigning_preserves_breaks() {
        let (service, store, _) = setup();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "").await;
        let date = d("2025-03-03");

        let outcome = service.toggle_break(emp.id, date, t("12:00")).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    end: Some(t("18:00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let shifts = store.fetch_shifts(date, date).await.unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].end_time, t("18:00"));
        assert!(shifts[0].break_times.contains(&t("12:00")));
    }

    #[tokio::test]
    async fn narrowing_a_shift_drops_uncovered_breaks() {
        let (service, store, _) = setup();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "").await;
        let date = d("2025-03-03");

        service.toggle_break(emp.id, date, t("11:00")).await.unwrap();
        service.toggle_break(emp.id, date, t("16:00")).await.unwrap();
        service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    end: Some(t("12:00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let shifts = store.fetch_shifts(date, date).await.unwrap();
        assert_eq!(shifts[0].end_time, t("12:00"));
        let breaks: Vec<_> = shifts[0].break_times.iter().copied().collect();
        assert_eq!(breaks, vec![t("11:00")]);

        // 16:00 is no longer in the span, so there is nothing to toggle off.
        let outcome = service.toggle_break(emp.id, date, t("16:00")).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NoOp);

        // Widening again does not bring the dropped break back.
        let widened = service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    end: Some(t("17:00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!widened.break_times.contains(&t("16:00")));
        assert_eq!(
            service.toggle_break(emp.id, date, t("16:00")).await.unwrap(),
            MutationOutcome::Applied
        );
    }

    #[tokio::test]
    async fn assign_rejects_bad_spans() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-03");

        let off_grid = service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    start: Some(t("09:15")),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(off_grid, Err(RosterError::InvalidInput(_))));

        let inverted = service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    start: Some(t("17:00")),
                    end: Some(t("09:00")),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(inverted, Err(RosterError::InvalidInput(_))));

        let unknown = service
            .assign_shift(999, date, ShiftPatch::default())
            .await;
        assert!(matches!(unknown, Err(RosterError::UnknownEmployee(999))));
    }

    #[tokio::test]
    async fn clear_shift_reports_noop_the_second_time() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-03");
        service
            .assign_shift(emp.id, date, ShiftPatch::default())
            .await
            .unwrap();

        assert_eq!(
            service.clear_shift(emp.id, date).await.unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(
            service.clear_shift(emp.id, date).await.unwrap(),
            MutationOutcome::NoOp
        );
    }

    // --- Breaks ---

    #[tokio::test]
    async fn break_toggle_outside_working_span_is_noop() {
        let (service, store, _) = setup();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "").await;
        let date = d("2025-03-03");

        let outcome = service.toggle_break(emp.id, date, t("17:00")).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NoOp);
        assert!(store.fetch_shifts(date, date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn break_toggle_on_requested_day_is_noop() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "").await;
        let date = d("2025-03-03");
        service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, date)
            .await
            .unwrap();

        let outcome = service.toggle_break(emp.id, date, t("12:00")).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NoOp);
    }

    // --- Time off and the deadline gate ---

    #[tokio::test]
    async fn staff_toggle_before_deadline_adds_then_removes() {
        let (service, store, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-05");
        let mode = UiMode::Staff { employee_id: emp.id };

        let first = service
            .toggle_time_off(mode, 2025, 3, emp.id, date)
            .await
            .unwrap();
        assert_eq!(first, MutationOutcome::Applied);
        assert_eq!(store.fetch_requests(date, date).await.unwrap().len(), 1);

        service
            .toggle_time_off(mode, 2025, 3, emp.id, date)
            .await
            .unwrap();
        assert!(store.fetch_requests(date, date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn staff_toggle_after_deadline_is_refused_without_change() {
        let (service, store, clock) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-05");
        let mode = UiMode::Staff { employee_id: emp.id };

        clock.set_time("2025-02-18 23:59:59");
        assert_eq!(
            service
                .toggle_time_off(mode, 2025, 3, emp.id, date)
                .await
                .unwrap(),
            MutationOutcome::Applied
        );

        // The gate reads the clock on every attempt.
        clock.advance(Duration::seconds(1));
        let outcome = service
            .toggle_time_off(mode, 2025, 3, emp.id, date)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MutationOutcome::Refused(RefusalReason::SubmissionClosed { .. })
        ));
        assert_eq!(store.fetch_requests(date, date).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_toggle_ignores_deadline() {
        let (service, store, clock) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-05");
        clock.set_time("2025-03-01 12:00:00");

        let outcome = service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, date)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(store.fetch_requests(date, date).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn staff_cannot_toggle_someone_else() {
        let (service, _, _) = setup();
        let aiko = add(&service, "Aiko", None, "").await;
        let ren = add(&service, "Ren", None, "").await;

        let outcome = service
            .toggle_time_off(
                UiMode::Staff { employee_id: aiko.id },
                2025,
                3,
                ren.id,
                d("2025-03-05"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Refused(RefusalReason::NotOwnRecord));
    }

    #[tokio::test]
    async fn toggle_outside_period_is_invalid() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let result = service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, d("2025-03-21"))
            .await;
        assert!(matches!(result, Err(RosterError::InvalidInput(_))));

        let bad_month = service
            .toggle_time_off(UiMode::Admin, 2025, 13, emp.id, d("2025-03-05"))
            .await;
        assert!(matches!(bad_month, Err(RosterError::Period(_))));
    }

    // --- Views ---

    #[tokio::test]
    async fn roster_view_prefers_shift_over_request() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        let date = d("2025-03-05");
        service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, date)
            .await
            .unwrap();
        service
            .assign_shift(emp.id, date, ShiftPatch::default())
            .await
            .unwrap();

        let view = service.roster_view(2025, 3).await.unwrap();
        let row = &view.employees[0];
        assert_eq!(row.days.len(), 28);
        let day = row.days.iter().find(|e| e.date == date).unwrap();
        assert!(matches!(day.state, EffectiveDayState::WorkingExplicit { .. }));
        assert_eq!(day.hours, dec!(8));
        assert_eq!(row.summary.total, dec!(8));
        assert!(!view.period.submission_closed);
    }

    #[tokio::test]
    async fn roster_view_totals_and_threshold() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", Some(("08:00", "17:00")), "").await;
        let view = service.roster_view(2025, 3).await.unwrap();
        let summary = &view.employees[0].summary;

        assert_eq!(summary.total, dec!(9) * Decimal::from(28));
        assert_eq!(summary.total, summary.weekly.iter().copied().sum::<Decimal>());
        assert_eq!(view.period.weeks.len(), summary.weekly.len());
        // 2025-02-21 is a Friday, so the first group has two 9h days.
        assert_eq!(summary.weekly[0], dec!(18));
        assert!(!summary.over_threshold_weeks.contains(&0));
        assert!(summary.over_threshold_weeks.contains(&1));
        assert_eq!(summary.employee_id, emp.id);
    }

    #[tokio::test]
    async fn task_view_appends_dangling_label() {
        let (service, _, _) = setup();
        service.add_task("Register").await.unwrap();
        let floor = service.add_task("Floor").await.unwrap();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "Register").await;
        let date = d("2025-03-03");
        service
            .assign_shift(
                emp.id,
                date,
                ShiftPatch {
                    task: Some("Floor".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.remove_task(floor.id).await.unwrap();
        service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, d("2025-03-04"))
            .await
            .unwrap();

        let view = service.task_view(2025, 3).await.unwrap();
        let cells = &view[0].days;
        let assigned = cells.iter().find(|c| c.date == date).unwrap();
        assert_eq!(assigned.task, "Floor");
        assert_eq!(assigned.options, vec!["Register", "Floor"]);

        let requested = cells.iter().find(|c| c.date == d("2025-03-04")).unwrap();
        assert_eq!(requested.task, "");
        assert_eq!(requested.options, vec!["Register"]);

        let defaulted = cells.iter().find(|c| c.date == d("2025-03-05")).unwrap();
        assert_eq!(defaulted.task, "Register");
    }

    #[tokio::test]
    async fn daily_board_marks_working_slots() {
        let (service, _, _) = setup();
        let emp = add(&service, "Aiko", Some(("10:00", "12:00")), "Register").await;
        add(&service, "Ren", None, "").await;
        let date = d("2025-03-03");
        service.toggle_break(emp.id, date, t("11:00")).await.unwrap();

        let board = service.daily_board(date).await.unwrap();
        assert_eq!(board.grid.len(), 25);
        assert_eq!(board.rows.len(), 2);

        let aiko = &board.rows[0];
        assert_eq!(aiko.task, "Register");
        let working = aiko.slots.iter().filter(|s| s.working).count();
        assert_eq!(working, 4);
        let on_break: Vec<_> = aiko.slots.iter().filter(|s| s.on_break).map(|s| s.time).collect();
        assert_eq!(on_break, vec![t("11:00")]);

        let ren = &board.rows[1];
        assert_eq!(ren.state, EffectiveDayState::OffNoData);
        assert!(ren.slots.iter().all(|s| !s.working));
    }

    #[tokio::test]
    async fn staff_calendar_shows_only_explicit_shifts() {
        let (service, _, clock) = setup();
        let emp = add(&service, "Aiko", Some(("09:00", "17:00")), "Register").await;
        service
            .assign_shift(
                emp.id,
                d("2025-03-03"),
                ShiftPatch {
                    start: Some(t("12:00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service
            .toggle_time_off(UiMode::Admin, 2025, 3, emp.id, d("2025-03-04"))
            .await
            .unwrap();

        let calendar = service.staff_calendar(2025, 3, emp.id).await.unwrap();
        assert!(!calendar.submission_closed);
        let by_date = |date: &str| {
            calendar
                .days
                .iter()
                .find(|day| day.date == d(date))
                .unwrap()
                .clone()
        };
        assert_eq!(by_date("2025-03-03").shift, Some((t("12:00"), t("17:00"))));
        assert!(by_date("2025-03-04").requested_off);
        assert_eq!(by_date("2025-03-05").shift, None);
        assert_eq!(by_date("2025-03-05").task, "Register");

        clock.set_time("2025-02-19 00:00:00");
        let closed = service.staff_calendar(2025, 3, emp.id).await.unwrap();
        assert!(closed.submission_closed);

        assert!(matches!(
            service.staff_calendar(2025, 3, 999).await,
            Err(RosterError::UnknownEmployee(999))
        ));
    }

    #[tokio::test]
    async fn current_period_rolls_over_on_the_21st() {
        let (service, _, clock) = setup();
        assert_eq!(service.current_period().unwrap().month(), 2);
        clock.set_time("2025-02-21 00:00:00");
        assert_eq!(service.current_period().unwrap().month(), 3);
        clock.set_time("2025-12-21 08:00:00");
        let period = service.current_period().unwrap();
        assert_eq!((period.year(), period.month()), (2026, 1));
    }

    #[tokio::test]
    async fn hours_csv_has_a_row_per_employee() {
        let (service, _, _) = setup();
        add(&service, "Aiko", Some(("09:00", "17:00")), "").await;
        add(&service, "Ren", None, "").await;

        let csv = service.hours_csv(2025, 3).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("employee_id,name,week_of_2025-02-21"));
        assert!(lines[1].contains(",224,"));
        assert!(lines[2].ends_with(",0,0"));
    }

    // --- Master data ---

    #[tokio::test]
    async fn removing_employee_drops_their_records() {
        let (service, store, _) = setup();
        let emp = add(&service, "Aiko", None, "").await;
        service
            .assign_shift(emp.id, d("2025-03-03"), ShiftPatch::default())
            .await
            .unwrap();
        service.remove_employee(emp.id).await.unwrap();

        assert!(service.list_employees().await.unwrap().is_empty());
        assert!(store
            .fetch_shifts(d("2025-02-21"), d("2025-03-20"))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            service.remove_employee(emp.id).await,
            Err(RosterError::UnknownEmployee(_))
        ));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let (service, _, _) = setup();
        assert!(matches!(
            service.add_task("   ").await,
            Err(RosterError::InvalidInput(_))
        ));
        assert!(matches!(
            service.add_employee(NewEmployee::default()).await,
            Err(RosterError::InvalidInput(_))
        ));
        let task = service.add_task("  Stock ").await.unwrap();
        assert_eq!(task.name, "Stock");
        assert_eq!(service.list_tasks().await.unwrap(), vec![task]);
    }

    #[tokio::test]
    async fn employee_defaults_must_be_an_on_grid_forward_span() {
        let (service, store, _) = setup();
        let with_defaults = |start: &str, end: &str| NewEmployee {
            name: "Aiko".to_string(),
            default_start_time: Some(t(start)),
            default_end_time: Some(t(end)),
            ..Default::default()
        };

        let rejected = [
            ("17:00", "03:15"),
            ("17:00", "09:00"),
            ("12:00", "12:00"),
            ("09:10", "17:00"),
        ];
        for (start, end) in rejected {
            let result = service.add_employee(with_defaults(start, end)).await;
            assert!(
                matches!(result, Err(RosterError::InvalidInput(_))),
                "{}-{} should be rejected",
                start,
                end
            );
        }
        assert!(store.fetch_employees().await.unwrap().is_empty());

        // A lone default is still checked against the grid.
        let lone = service
            .add_employee(NewEmployee {
                name: "Ren".to_string(),
                default_end_time: Some(t("21:00")),
                ..Default::default()
            })
            .await;
        assert!(matches!(lone, Err(RosterError::InvalidInput(_))));

        let emp = service.add_employee(with_defaults("09:00", "17:00")).await.unwrap();
        let view = service.roster_view(2025, 3).await.unwrap();
        assert_eq!(view.employees[0].employee.id, emp.id);
        assert!(view.employees[0].summary.total > Decimal::ZERO);
    }
}
