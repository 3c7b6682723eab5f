//! Built-in tools: small stateless helpers plus two caller-owned stores.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{Tool, ToolResult};

#[derive(Deserialize)]
struct ReverseParams {
    text: String,
}

pub fn reverse_string() -> Tool {
    Tool::typed(
        "reverse_string",
        "Reverse a string",
        json!({
            "type": "object",
            "properties": {"text": {"type": "string", "description": "The string to reverse"}},
            "required": ["text"]
        }),
        |p: ReverseParams| ToolResult::ok(p.text.chars().rev().collect::<String>()),
    )
}

/// Current time as seconds since the unix epoch.
pub fn current_time() -> Tool {
    Tool::new(
        "current_time",
        "Get the current time as seconds since the unix epoch",
        |_args| match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => ToolResult::ok(d.as_secs().to_string()),
            Err(e) => ToolResult::error(format!("system clock before unix epoch: {e}")),
        },
    )
    .with_parameters(json!({"type": "object", "properties": {}}))
}

#[derive(Deserialize)]
struct CalculateParams {
    expression: String,
}

/// Arithmetic over numbers with `+ - * / %`, unary minus and parentheses.
pub fn calculate() -> Tool {
    Tool::typed(
        "calculate",
        "Evaluate an arithmetic expression",
        json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string", "description": "e.g. '42 * (137 - 7) / 2'"}
            },
            "required": ["expression"]
        }),
        |p: CalculateParams| match evaluate(&p.expression) {
            Ok(value) => ToolResult::ok(format_number(value)),
            Err(msg) => ToolResult::error(format!("Error: {msg}")),
        },
    )
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Calculator {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    let value = parser.sum()?;
    match parser.peek() {
        None => Ok(value),
        Some(c) => Err(format!("unexpected '{c}' at position {}", parser.pos + 1)),
    }
}

/// Recursive descent: sum := product (('+'|'-') product)*,
/// product := unary (('*'|'/'|'%') unary)*, unary := '-' unary | atom.
struct Calculator {
    chars: Vec<char>,
    pos: usize,
}

impl Calculator {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn sum(&mut self) -> Result<f64, String> {
        let mut value = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn product(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op != '*' && rhs == 0.0 {
                return Err("division by zero".to_string());
            }
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.peek() == Some('-') {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.sum()?;
                if self.peek() != Some(')') {
                    return Err("missing ')'".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse()
                    .map_err(|_| format!("invalid number '{literal}'"))
            }
            Some(c) => Err(format!("unexpected '{c}' at position {}", self.pos + 1)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

// Task tracker

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
}

#[derive(Debug)]
struct Board {
    tasks: BTreeMap<u32, Task>,
    next_id: u32,
}

/// Task store shared between the caller and the task tools.
///
/// Clones share the same board.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    board: Arc<Mutex<Board>>,
}

#[derive(Deserialize)]
struct AddTaskParams {
    title: String,
    #[serde(default)]
    priority: Priority,
}

#[derive(Deserialize)]
struct UpdateTaskParams {
    task_id: u32,
    status: TaskStatus,
}

#[derive(Deserialize)]
struct DeleteTaskParams {
    task_id: u32,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBoard {
    pub fn new() -> Self {
        Self {
            board: Arc::new(Mutex::new(Board {
                tasks: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        match self.board.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, title: impl Into<String>, priority: Priority) -> Task {
        let mut board = self.lock();
        let task = Task {
            id: board.next_id,
            title: title.into(),
            priority,
            status: TaskStatus::Todo,
        };
        board.next_id += 1;
        board.tasks.insert(task.id, task.clone());
        task
    }

    pub fn update(&self, id: u32, status: TaskStatus) -> Option<Task> {
        let mut board = self.lock();
        let task = board.tasks.get_mut(&id)?;
        task.status = status;
        Some(task.clone())
    }

    pub fn delete(&self, id: u32) -> Option<Task> {
        self.lock().tasks.remove(&id)
    }

    /// Tasks ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.values().cloned().collect()
    }

    pub fn render(&self) -> String {
        let tasks = self.tasks();
        if tasks.is_empty() {
            return "No tasks yet.".to_string();
        }
        tasks
            .iter()
            .map(|t| format!("  #{} [{}] {} ({})", t.id, t.priority, t.title, t.status))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `add_task`, `list_tasks`, `update_task` and `delete_task`, all bound to this board.
    pub fn tools(&self) -> Vec<Tool> {
        let add = self.clone();
        let list = self.clone();
        let update = self.clone();
        let delete = self.clone();
        vec![
            Tool::typed(
                "add_task",
                "Add a new task to the tracker",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "priority": {"type": "string", "enum": ["high", "medium", "low"]}
                    },
                    "required": ["title"]
                }),
                move |p: AddTaskParams| {
                    let task = add.add(p.title, p.priority);
                    ToolResult::ok(format!(
                        "Created task #{}: {} [{}]",
                        task.id, task.title, task.priority
                    ))
                },
            ),
            Tool::new(
                "list_tasks",
                "List all tasks with their status and priority",
                move |_args| ToolResult::ok(list.render()),
            )
            .with_parameters(json!({"type": "object", "properties": {}})),
            Tool::typed(
                "update_task",
                "Update the status of an existing task",
                json!({
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "integer"},
                        "status": {"type": "string", "enum": ["todo", "in-progress", "done"]}
                    },
                    "required": ["task_id", "status"]
                }),
                move |p: UpdateTaskParams| match update.update(p.task_id, p.status) {
                    Some(t) => ToolResult::ok(format!("Task #{} updated to '{}'.", t.id, t.status)),
                    None => ToolResult::error(format!("Task #{} not found.", p.task_id)),
                },
            ),
            Tool::typed(
                "delete_task",
                "Delete a task by ID",
                json!({
                    "type": "object",
                    "properties": {"task_id": {"type": "integer"}},
                    "required": ["task_id"]
                }),
                move |p: DeleteTaskParams| match delete.delete(p.task_id) {
                    Some(t) => ToolResult::ok(format!("Deleted task #{}: {}", t.id, t.title)),
                    None => ToolResult::error(format!("Task #{} not found.", p.task_id)),
                },
            ),
        ]
    }
}

// Review findings

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// critical | warning | suggestion | praise
    pub severity: String,
    /// bug | security | performance | style | best-practice
    pub category: String,
    /// Approximate line number, 0 when general.
    #[serde(default)]
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.line > 0 {
            format!("L{}", self.line)
        } else {
            "general".to_string()
        };
        write!(
            f,
            "[{}] ({}, {}) {}",
            self.severity.to_uppercase(),
            self.category,
            location,
            self.message
        )
    }
}

/// Findings recorded by the model through `record_finding`.
#[derive(Debug, Clone, Default)]
pub struct FindingsLog {
    findings: Arc<Mutex<Vec<Finding>>>,
}

impl FindingsLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Finding>> {
        match self.findings.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, finding: Finding) {
        self.lock().push(finding);
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn tool(&self) -> Tool {
        let log = self.clone();
        Tool::typed(
            "record_finding",
            "Record one review finding. Call it once per code issue or positive observation.",
            json!({
                "type": "object",
                "properties": {
                    "severity": {"type": "string"},
                    "category": {"type": "string"},
                    "line": {"type": "integer"},
                    "message": {"type": "string"}
                },
                "required": ["severity", "category", "message"]
            }),
            move |finding: Finding| {
                let reply = format!("Recorded {} finding: {}", finding.severity, finding.message);
                log.record(finding);
                ToolResult::ok(reply)
            },
        )
    }
}
