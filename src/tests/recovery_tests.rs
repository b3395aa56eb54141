//! tests/recovery_tests.rs
//! Relanzamiento de tareas que quedaron en "running" tras una caída.

#[cfg(test)]
mod tests {
    use actix_rt::test;

    use crate::models::task_model::TaskStatus;
    use crate::tests::support::{new_task, Harness};

    /// Simula una caída: la tarea queda en running con el cursor a mitad de camino.
    async fn crash_at(h: &Harness, group_ids: Vec<i64>, index: i64, success: i64) -> String {
        let task_id = h.store.create_task(&new_task(group_ids)).await.unwrap();
        sqlx::query("UPDATE tasks SET current_index = ?2, success = ?3 WHERE id = ?1")
            .bind(&task_id)
            .bind(index)
            .bind(success)
            .execute(&h.pool)
            .await
            .unwrap();
        task_id
    }

    #[test]
    async fn test_resumes_only_remaining_recipients() {
        let h = Harness::new().await;
        let task_id = crash_at(&h, vec![10, 11, 12, 13, 14], 2, 2).await;

        let launched = h.recovery().resume_running_tasks().await.unwrap();
        assert_eq!(launched.len(), 1);
        for (id, handle) in launched {
            assert_eq!(id, task_id);
            assert_eq!(handle.await.unwrap(), TaskStatus::Done);
        }

        assert_eq!(h.client.calls(), vec![12, 13, 14]);
        let task = h.store.get_task(&task_id).await.unwrap().unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!((task.current_index, task.total, task.success, task.failed), (5, 5, 5, 0));
        assert!(task.success + task.failed <= task.current_index);
    }

    #[test]
    async fn test_crash_at_completion_finalizes_immediately() {
        let h = Harness::new().await;
        let task_id = crash_at(&h, vec![1, 2], 2, 2).await;

        let launched = h.recovery().resume_running_tasks().await.unwrap();
        for (_, handle) in launched {
            assert_eq!(handle.await.unwrap(), TaskStatus::Done);
        }

        assert!(h.client.calls().is_empty());
        let task = h.store.get_task(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.finished_at.is_some());
        assert_eq!(h.event_names(&task_id).await.last().map(String::as_str), Some("finished"));
    }

    #[test]
    async fn test_pending_stop_is_honoured_on_recovery() {
        let h = Harness::new().await;
        let task_id = crash_at(&h, vec![1, 2, 3], 1, 1).await;
        h.store.request_stop(&task_id).await.unwrap();

        let launched = h.recovery().resume_running_tasks().await.unwrap();
        for (_, handle) in launched {
            assert_eq!(handle.await.unwrap(), TaskStatus::Stopped);
        }

        assert!(h.client.calls().is_empty());
        let task = h.store.get_task(&task_id).await.unwrap().unwrap();
        assert_eq!(task.current_index, 1);
    }

    #[test]
    async fn test_terminal_tasks_are_not_relaunched() {
        let h = Harness::new().await;
        let (_, handle) = h.tasks.create_task(new_task(vec![1])).await.unwrap();
        handle.await.unwrap();

        let launched = h.recovery().resume_running_tasks().await.unwrap();
        assert!(launched.is_empty());
        assert_eq!(h.client.calls(), vec![1]);
    }
}
