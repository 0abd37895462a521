//! Test fixtures - generated projects as `(path, content)` pairs

pub type Project = &'static [(&'static str, &'static str)];

/// Typical generated app: entry, nested components, a package import and
/// a stylesheet
pub fn calculator_app() -> Project {
    &[
        (
            "/App.jsx",
            r#"import React from 'react';
import Calculator from '@/components/Calculator';
import './styles.css';

export default function App() {
  return (
    <div className="min-h-screen flex items-center justify-center bg-gray-100">
      <Calculator />
    </div>
  );
}
"#,
        ),
        (
            "/components/Calculator.jsx",
            r#"import { useState } from 'react';
import Button from '@/components/ui/Button';
import { evaluate } from '@/lib/math';

export default function Calculator() {
  const [display, setDisplay] = useState('0');
  const keys = ['7', '8', '9', '+', '4', '5', '6', '-', '1', '2', '3', '='];

  // Don't evaluate until '=' is pressed
  const press = (key) =>
    key === '=' ? setDisplay(String(evaluate(display))) : setDisplay(`${display}${key}`);

  return (
    <div className="grid grid-cols-4 gap-2">
      <p className="col-span-4 text-right">{display}</p>
      {keys.map((key) => (
        <Button key={key} label={key} onClick={() => press(key)} />
      ))}
    </div>
  );
}
"#,
        ),
        (
            "/components/ui/Button.jsx",
            r#"export default function Button({ label, onClick }) {
  return (
    <button className="rounded px-4 py-2 bg-blue-500 text-white" onClick={onClick}>
      {label}
    </button>
  );
}
"#,
        ),
        (
            "/lib/math.js",
            r#"export function evaluate(expression) {
  const tokens = expression.split(/([+-])/);
  return tokens.reduce((total, token, i) =>
    i === 0 ? Number(token) : tokens[i - 1] === '-' ? total - Number(token) : total + Number(token),
  0);
}
"#,
        ),
        ("/styles.css", "body { margin: 0; }\n"),
    ]
}

/// TypeScript entry with a type-only import and a re-exporting index
pub fn typescript_app() -> Project {
    &[
        (
            "/App.tsx",
            r#"import type { Todo } from '@/types';
import { TodoList } from '@/components';

const initial: Todo[] = [{ id: 1, title: "Write tests", done: false }];

export default function App() {
  return <TodoList todos={initial} />;
}
"#,
        ),
        (
            "/components/index.ts",
            "export { default as TodoList } from './TodoList';\n",
        ),
        (
            "/components/TodoList.tsx",
            r#"import type { Todo } from '../types';

export default function TodoList({ todos }: { todos: Todo[] }) {
  return <ul>{todos.map((t) => <li key={t.id}>{t.title}</li>)}</ul>;
}
"#,
        ),
        (
            "/types.ts",
            "export interface Todo {\n  id: number;\n  title: string;\n  done: boolean;\n}\n",
        ),
    ]
}

/// `/a.jsx` and `/b.jsx` import each other; the entry imports `/a.jsx`
pub fn two_file_cycle() -> Project {
    &[
        (
            "/App.jsx",
            "import A from '@/a';\nexport default function App() { return <A />; }\n",
        ),
        ("/a.jsx", "import B from '@/b';\nexport default function A() { return <B />; }\n"),
        ("/b.jsx", "import A from '@/a';\nexport default function B() { return null; }\n"),
    ]
}

/// Entry importing three components that were never written
pub fn missing_components() -> Project {
    &[(
        "/App.jsx",
        r#"import Header from '@/components/Header';
import Footer from '@/components/Footer';
import Sidebar from './components/Sidebar';

export default function App() {
  return <><Header /><Sidebar /><Footer /></>;
}
"#,
    )]
}

/// Entry exists but forgot its default export
pub fn no_default_export() -> Project {
    &[(
        "/App.jsx",
        "export function App() {\n  return <h1>Hello</h1>;\n}\n",
    )]
}

/// Lazily loaded page that imports the entry back
pub fn lazy_route() -> Project {
    &[
        (
            "/App.jsx",
            r#"import { lazy, Suspense } from 'react';

const Settings = lazy(() => import('@/pages/Settings'));

export const theme = 'dark';

export default function App() {
  return <Suspense fallback={null}><Settings /></Suspense>;
}
"#,
        ),
        (
            "/pages/Settings.jsx",
            "import { theme } from '@/App';\nexport default function Settings() { return <p>{theme}</p>; }\n",
        ),
    ]
}
