//! Prompt assembly for component generation

use crate::llm::{PromptMessage, PromptRole};
use crate::models::Session;

/// Fixed system instruction; it shapes the output format only
pub const SYSTEM_INSTRUCTION: &str = r#"You generate production-ready React components written in TypeScript.

Output rules:
- Answer with exactly two fenced code blocks: first a ```tsx block with the component, then a ```css block with its styles.
- The component is a single `React.FC` with a typed props interface and is the default export.
- Give every optional prop a default in the destructuring, e.g. `{ label = 'Button', className = '', disabled = false }`.
- Compute class names in a variable before the JSX; never call methods on template literals inside JSX expressions.
- Use plain CSS class selectors only: no CSS modules, no imports. Cover hover, focus and disabled states.
- Make the component accessible: ARIA attributes where relevant, keyboard support, visible focus outlines and sufficient contrast.

Example shape:

```tsx
import React from 'react';

interface ActionButtonProps {
  label?: string;
  className?: string;
  disabled?: boolean;
  onClick?: () => void;
}

const ActionButton: React.FC<ActionButtonProps> = ({
  label = 'Continue',
  className = '',
  disabled = false,
  onClick = () => {},
}) => {
  const buttonClassName = `action-button ${className}`.trim();

  return (
    <button className={buttonClassName} disabled={disabled} onClick={onClick} aria-label={label}>
      {label}
    </button>
  );
};

export default ActionButton;
```

```css
.action-button {
  padding: 10px 20px;
  border: none;
  border-radius: 6px;
  background: #4f46e5;
  color: #fff;
  cursor: pointer;
}

.action-button:hover {
  background: #4338ca;
}

.action-button:focus {
  outline: 2px solid #4f46e5;
  outline-offset: 2px;
}

.action-button:disabled {
  opacity: 0.6;
  cursor: not-allowed;
}
```"#;

/// Build the upstream message list: system instruction, prior history, new prompt
pub fn build_messages(session: &Session, prompt: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(session.chat_history.len() + 2);

    messages.push(PromptMessage {
        role: PromptRole::System,
        content: SYSTEM_INSTRUCTION.to_string(),
    });

    messages.extend(session.chat_history.iter().map(|message| PromptMessage {
        role: message.role.into(),
        content: message.content.clone(),
    }));

    messages.push(PromptMessage {
        role: PromptRole::User,
        content: prompt.to_string(),
    });

    messages
}
